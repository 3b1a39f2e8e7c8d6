//! Index Reconciler
//!
//! Brings a collection's secondary indexes to a declared target state.
//!
//! ## Two phases
//!
//! 1. **Drop**: every name in `drop_names` that exists is removed. Missing
//!    names are skipped, never errors.
//! 2. **Ensure**: every desired definition whose key sequence is not
//!    already indexed is created. An existing index with an equivalent key
//!    sequence satisfies the definition regardless of its name or options.
//!
//! All drops finish before the first create is issued. Requests are sent one
//! at a time and awaited, and the catalog is re-read between the phases.
//!
//! ## Idempotence
//!
//! A listed drop name whose index already matches a desired definition
//! exactly (keys, uniqueness and name) is kept unless the collection sets
//! `force_rebuild`. A second run with unchanged inputs therefore issues no
//! requests beyond the two catalog reads.
//!
//! ## Failure handling
//!
//! - Connection loss aborts the run with [`ReconcileError::Connection`],
//!   which keeps the operations applied so far and the one in flight
//! - A rejected drop or create is logged, recorded, and the phase moves on;
//!   the run then ends with [`ReconcileError::IndexBuild`] carrying the full
//!   report. Nothing is rolled back.
//!
//! ## Example Usage
//!
//! ```rust
//! use indexsync_core::config::CollectionConfig;
//! use indexsync_core::db::MemoryStore;
//! use indexsync_core::models::IndexSpec;
//! use indexsync_core::services::IndexReconciler;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reconciler = IndexReconciler::new(Arc::new(MemoryStore::new()));
//!
//! let variants = CollectionConfig::new("variants")
//!     .drop_name("rsid_1_assaytype_1")
//!     .ensure_spec(IndexSpec::ascending(["rsid", "assaytype"]))
//!     .ensure_spec(IndexSpec::ascending(["assaytype"]));
//!
//! let report = reconciler.reconcile(&variants).await?;
//! assert_eq!(report.creates(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::CollectionConfig;
use crate::db::{IndexStore, StoreError};
use crate::models::{IndexDefinition, IndexSet, IndexSpec};
use crate::services::ReconcileError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A single catalog mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IndexOperation {
    Drop {
        name: String,
    },
    Create {
        name: String,
        definition: IndexDefinition,
    },
}

impl IndexOperation {
    pub fn name(&self) -> &str {
        match self {
            IndexOperation::Drop { name } | IndexOperation::Create { name, .. } => name,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, IndexOperation::Drop { .. })
    }
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperation::Drop { name } => write!(f, "drop index '{}'", name),
            IndexOperation::Create { name, definition } => {
                write!(f, "create index '{}' on {}", name, definition.fields)?;
                if definition.options.unique {
                    write!(f, " (unique)")?;
                }
                Ok(())
            }
        }
    }
}

/// What happened (or will happen) to an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// Planned for execution (dry runs only)
    Pending,
    Applied,
    Skipped(String),
    Failed(String),
}

/// An operation together with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    #[serde(flatten)]
    pub operation: IndexOperation,
    #[serde(flatten)]
    pub outcome: OperationOutcome,
}

impl OperationRecord {
    fn pending(operation: IndexOperation) -> Self {
        Self {
            operation,
            outcome: OperationOutcome::Pending,
        }
    }

    fn skipped(operation: IndexOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            outcome: OperationOutcome::Skipped(reason.into()),
        }
    }
}

/// Operations a run would perform, computed without touching the catalog
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilePlan {
    pub collection: String,
    pub records: Vec<OperationRecord>,
}

impl ReconcilePlan {
    /// Operations that would mutate the catalog
    pub fn pending(&self) -> impl Iterator<Item = &IndexOperation> {
        self.records
            .iter()
            .filter(|r| r.outcome == OperationOutcome::Pending)
            .map(|r| &r.operation)
    }

    pub fn is_noop(&self) -> bool {
        self.pending().next().is_none()
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub collection: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<OperationRecord>,
}

impl ReconcileReport {
    fn count(&self, drops: bool, outcome: fn(&OperationOutcome) -> bool) -> usize {
        self.records
            .iter()
            .filter(|r| r.operation.is_drop() == drops && outcome(&r.outcome))
            .count()
    }

    /// Indexes actually dropped
    pub fn drops(&self) -> usize {
        self.count(true, |o| *o == OperationOutcome::Applied)
    }

    /// Indexes actually created
    pub fn creates(&self) -> usize {
        self.count(false, |o| *o == OperationOutcome::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, OperationOutcome::Skipped(_)))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, OperationOutcome::Failed(_)))
            .count()
    }

    pub fn failed_records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, OperationOutcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Reconciles collection indexes against an [`IndexStore`]
///
/// Stateless between runs; the store's catalog is the only state.
pub struct IndexReconciler<S: IndexStore + ?Sized> {
    store: Arc<S>,
}

impl<S: IndexStore + ?Sized> IndexReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Compute the operations `reconcile` would perform, without mutating
    pub async fn plan(&self, config: &CollectionConfig) -> Result<ReconcilePlan, ReconcileError> {
        let current = self.list(&config.collection).await?;

        let drops = plan_drops(config, &current);
        let dropped: HashSet<&str> = drops
            .iter()
            .filter(|r| r.outcome == OperationOutcome::Pending)
            .map(|r| r.operation.name())
            .collect();
        let after_drops: IndexSet = current
            .iter()
            .filter(|info| !dropped.contains(info.name.as_str()))
            .cloned()
            .collect();
        let creates = plan_creates(config, &after_drops);

        let mut records = drops;
        records.extend(creates);

        Ok(ReconcilePlan {
            collection: config.collection.clone(),
            records,
        })
    }

    /// Run both phases against the store
    ///
    /// # Errors
    ///
    /// - `Connection`: the store became unreachable; the run stopped there
    ///   and the error carries what had already been applied
    /// - `IndexBuild`: every item was attempted but at least one failed
    pub async fn reconcile(
        &self,
        config: &CollectionConfig,
    ) -> Result<ReconcileReport, ReconcileError> {
        let collection = config.collection.as_str();
        let mut run = Run::start(collection);

        tracing::info!("Reconciling indexes on collection '{}'", collection);

        // Phase 1: drop
        let current = match self.store.list_indexes(collection).await {
            Ok(current) => current,
            Err(e) => return Err(run.abort(None, e)),
        };
        for planned in plan_drops(config, &current) {
            run = self.step(run, planned).await?;
        }

        // Phase 2: ensure, against the post-drop catalog
        let current = match self.store.list_indexes(collection).await {
            Ok(current) => current,
            Err(e) => return Err(run.abort(None, e)),
        };
        for planned in plan_creates(config, &current) {
            run = self.step(run, planned).await?;
        }

        let report = run.finish();

        tracing::info!(
            "Collection '{}': {} dropped, {} created, {} skipped, {} failed",
            collection,
            report.drops(),
            report.creates(),
            report.skipped(),
            report.failures()
        );

        if report.is_success() {
            Ok(report)
        } else {
            Err(ReconcileError::index_build(report))
        }
    }

    /// Reconcile collections in order, stopping at the first connection error
    ///
    /// Collections with rejected operations do not stop the run; their
    /// reports come back with `is_success() == false`. A connection error
    /// carries the reports of the collections finished before it.
    pub async fn reconcile_all(
        &self,
        configs: &[CollectionConfig],
    ) -> Result<Vec<ReconcileReport>, ReconcileError> {
        let mut reports = Vec::with_capacity(configs.len());
        for config in configs {
            match self.reconcile(config).await {
                Ok(report) => reports.push(report),
                Err(ReconcileError::IndexBuild { report, .. }) => reports.push(*report),
                Err(e) => return Err(e.with_completed(reports)),
            }
        }
        Ok(reports)
    }

    async fn list(&self, collection: &str) -> Result<IndexSet, ReconcileError> {
        self.store
            .list_indexes(collection)
            .await
            .map_err(|e| ReconcileError::connection(collection, e))
    }

    /// Execute a planned record if pending, then append it to the run
    async fn step<'a>(
        &self,
        mut run: Run<'a>,
        planned: OperationRecord,
    ) -> Result<Run<'a>, ReconcileError> {
        let record = match planned.outcome {
            OperationOutcome::Pending => {
                match self.execute(run.collection, planned.operation).await {
                    Ok(record) => record,
                    Err((operation, e)) => return Err(run.abort(Some(operation), e)),
                }
            }
            _ => {
                tracing::debug!(
                    "Skipping {} on '{}': {:?}",
                    planned.operation,
                    run.collection,
                    planned.outcome
                );
                planned
            }
        };
        run.records.push(record);
        Ok(run)
    }

    /// Issue one request; only connection loss escapes as an error
    async fn execute(
        &self,
        collection: &str,
        operation: IndexOperation,
    ) -> Result<OperationRecord, (IndexOperation, StoreError)> {
        let result = match &operation {
            IndexOperation::Drop { name } => self.store.drop_index(collection, name).await,
            IndexOperation::Create { definition, .. } => self
                .store
                .create_index(collection, &definition.fields, &definition.options)
                .await
                .map(|_| ()),
        };

        let outcome = match result {
            Ok(()) => {
                tracing::info!("Collection '{}': {}", collection, operation);
                OperationOutcome::Applied
            }
            Err(e) if e.is_connection() => {
                tracing::error!("Collection '{}': {} aborted: {}", collection, operation, e);
                return Err((operation, e));
            }
            // Gone between listing and dropping: the goal is met
            Err(StoreError::NotFound { .. }) if operation.is_drop() => {
                tracing::debug!("Collection '{}': {} found nothing", collection, operation);
                OperationOutcome::Skipped("not present".to_string())
            }
            Err(e) => {
                tracing::warn!("Collection '{}': {} failed: {}", collection, operation, e);
                OperationOutcome::Failed(e.to_string())
            }
        };

        Ok(OperationRecord { operation, outcome })
    }
}

/// Records accumulated by an in-progress `reconcile`
struct Run<'a> {
    collection: &'a str,
    started_at: DateTime<Utc>,
    records: Vec<OperationRecord>,
}

impl<'a> Run<'a> {
    fn start(collection: &'a str) -> Self {
        Self {
            collection,
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    fn finish(self) -> ReconcileReport {
        ReconcileReport {
            collection: self.collection.to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            records: self.records,
        }
    }

    fn abort(self, operation: Option<IndexOperation>, source: StoreError) -> ReconcileError {
        ReconcileError::aborted(self.finish(), operation, source)
    }
}

/// Decide each drop-name against the current catalog
fn plan_drops(config: &CollectionConfig, current: &IndexSet) -> Vec<OperationRecord> {
    let mut seen = HashSet::new();

    config
        .drop_names
        .iter()
        .map(|name| {
            let operation = IndexOperation::Drop { name: name.clone() };

            if !seen.insert(name.as_str()) {
                return OperationRecord::skipped(operation, "listed more than once");
            }

            let Some(existing) = current.get(name) else {
                return OperationRecord::skipped(operation, "not present");
            };

            if !config.force_rebuild
                && config.desired_indexes.iter().any(|d| d.matches(existing))
            {
                return OperationRecord::skipped(operation, "already matches desired definition");
            }

            OperationRecord::pending(operation)
        })
        .collect()
}

/// Decide each desired definition by key-sequence equivalence
fn plan_creates(config: &CollectionConfig, current: &IndexSet) -> Vec<OperationRecord> {
    let mut planned: Vec<(&IndexSpec, String)> = Vec::new();

    config
        .desired_indexes
        .iter()
        .map(|definition| {
            let name = definition.resolved_name();
            let operation = IndexOperation::Create {
                name: name.clone(),
                definition: definition.clone(),
            };

            if let Some(existing) = current.find_by_spec(&definition.fields) {
                return OperationRecord::skipped(
                    operation,
                    format!("satisfied by existing index '{}'", existing.name),
                );
            }

            if let Some((_, earlier)) = planned.iter().find(|(spec, _)| **spec == definition.fields)
            {
                return OperationRecord::skipped(
                    operation,
                    format!("satisfied by earlier definition '{}'", earlier),
                );
            }

            planned.push((&definition.fields, name));
            OperationRecord::pending(operation)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StoreCall};
    use crate::models::{IndexInfo, IndexKey, IndexOptions};

    fn rsid() -> IndexSpec {
        IndexSpec::ascending(["rsid", "assaytype"])
    }

    #[test]
    fn test_plan_drops_skips_missing_and_repeated() {
        let config = CollectionConfig::new("variants")
            .drop_name("nonexistent")
            .drop_name("legacy")
            .drop_name("legacy");
        let current = IndexSet::new(vec![IndexInfo::new("legacy", rsid())]);

        let records = plan_drops(&config, &current);
        assert_eq!(
            records[0].outcome,
            OperationOutcome::Skipped("not present".into())
        );
        assert_eq!(records[1].outcome, OperationOutcome::Pending);
        assert!(matches!(records[2].outcome, OperationOutcome::Skipped(_)));
    }

    #[test]
    fn test_plan_drops_keeps_exact_match_unless_forced() {
        let config = CollectionConfig::new("variants")
            .drop_name("rsid_1_assaytype_1")
            .ensure_spec(rsid());
        let current = IndexSet::new(vec![IndexInfo::new("rsid_1_assaytype_1", rsid())]);

        let kept = plan_drops(&config, &current);
        assert!(matches!(kept[0].outcome, OperationOutcome::Skipped(_)));

        let forced = plan_drops(&config.force_rebuild(true), &current);
        assert_eq!(forced[0].outcome, OperationOutcome::Pending);
    }

    #[test]
    fn test_plan_drops_rebuilds_when_options_differ() {
        let config = CollectionConfig::new("variants")
            .drop_name("rsid_1_assaytype_1")
            .ensure(IndexDefinition::with_options(
                rsid(),
                IndexOptions {
                    unique: true,
                    ..Default::default()
                },
            ));
        let current = IndexSet::new(vec![IndexInfo::new("rsid_1_assaytype_1", rsid())]);

        assert_eq!(
            plan_drops(&config, &current)[0].outcome,
            OperationOutcome::Pending
        );
    }

    #[test]
    fn test_plan_creates_by_key_sequence() {
        let reversed = IndexSpec::ascending(["assaytype", "rsid"]);
        let config = CollectionConfig::new("variants")
            .ensure_spec(rsid())
            .ensure_spec(reversed.clone())
            .ensure_spec(reversed);
        let current = IndexSet::new(vec![IndexInfo::new("some_other_name", rsid())]);

        let records = plan_creates(&config, &current);
        assert_eq!(
            records[0].outcome,
            OperationOutcome::Skipped("satisfied by existing index 'some_other_name'".into())
        );
        assert_eq!(records[1].outcome, OperationOutcome::Pending);
        assert_eq!(records[1].operation.name(), "assaytype_1_rsid_1");
        assert_eq!(
            records[2].outcome,
            OperationOutcome::Skipped("satisfied by earlier definition 'assaytype_1_rsid_1'".into())
        );
    }

    #[tokio::test]
    async fn test_plan_does_not_mutate() {
        let store = Arc::new(
            MemoryStore::new().with_index("variants", IndexInfo::new("legacy", rsid())),
        );
        let reconciler = IndexReconciler::new(store.clone());
        let config = CollectionConfig::new("variants")
            .drop_name("legacy")
            .ensure_spec(rsid());

        let plan = reconciler.plan(&config).await.unwrap();
        let pending: Vec<_> = plan.pending().map(|op| op.to_string()).collect();
        assert_eq!(
            pending,
            vec![
                "drop index 'legacy'".to_string(),
                "create index 'rsid_1_assaytype_1' on {rsid: 1, assaytype: 1}".to_string()
            ]
        );
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_drop_not_found_at_execution_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = IndexReconciler::new(store);

        let record = reconciler
            .execute(
                "variants",
                IndexOperation::Drop {
                    name: "gone".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            record.outcome,
            OperationOutcome::Skipped("not present".into())
        );
    }

    #[tokio::test]
    async fn test_descending_spec_is_created_separately() {
        let store = Arc::new(MemoryStore::new().with_index(
            "variants",
            IndexInfo::new("position_1", IndexSpec::ascending(["position"])),
        ));
        let reconciler = IndexReconciler::new(store.clone());
        let config = CollectionConfig::new("variants").ensure_spec(IndexSpec::new(vec![
            IndexKey::descending("position"),
        ]));

        let report = reconciler.reconcile(&config).await.unwrap();
        assert_eq!(report.creates(), 1);
        assert_eq!(
            store.mutations(),
            vec![StoreCall::Create {
                collection: "variants".into(),
                name: "position_-1".into()
            }]
        );
    }

    #[test]
    fn test_report_serializes_flat_records() {
        let report = ReconcileReport {
            collection: "variants".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            records: vec![OperationRecord::skipped(
                IndexOperation::Drop {
                    name: "nonexistent".into(),
                },
                "not present",
            )],
        };

        let value = serde_json::to_value(&report).unwrap();
        let record = &value["records"][0];
        assert_eq!(record["op"], "drop");
        assert_eq!(record["name"], "nonexistent");
        assert_eq!(record["outcome"], "skipped");
        assert_eq!(record["detail"], "not present");
    }
}
