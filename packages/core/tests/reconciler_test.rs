//! Integration tests for IndexReconciler against the in-memory store
//!
//! Tests cover:
//! - Idempotence of repeated runs
//! - Presence of desired specs and absence of dropped names
//! - Drop-before-create ordering
//! - Failure isolation and connection aborts

use indexsync_core::{
    db::{MemoryStore, StoreCall},
    models::{IndexDefinition, IndexInfo, IndexOptions, IndexSpec},
    services::{IndexReconciler, OperationOutcome, ReconcileError},
    CollectionConfig, IndexStore,
};
use std::sync::Arc;

const VARIANTS: &str = "variants";

/// Helper: the index layout maintained for the variants collection
fn variants_config() -> CollectionConfig {
    CollectionConfig::new(VARIANTS)
        .drop_name("rsid_1_assaytype_1")
        .drop_name("chromosome_1_position_1_assaytype_1")
        .drop_name("assaytype_1")
        .ensure_spec(IndexSpec::ascending(["rsid", "assaytype"]))
        .ensure_spec(IndexSpec::ascending(["chromosome", "position", "assaytype"]))
        .ensure_spec(IndexSpec::ascending(["assaytype"]))
}

/// Helper: reconciler over a fresh store seeded with `existing`
fn create_test_env(existing: Vec<IndexInfo>) -> (Arc<MemoryStore>, IndexReconciler<MemoryStore>) {
    let store = existing
        .into_iter()
        .fold(MemoryStore::new(), |store, info| store.with_index(VARIANTS, info));
    let store = Arc::new(store);
    let reconciler = IndexReconciler::new(store.clone());
    (store, reconciler)
}

fn drop_call(name: &str) -> StoreCall {
    StoreCall::Drop {
        collection: VARIANTS.to_string(),
        name: name.to_string(),
    }
}

fn create_call(name: &str) -> StoreCall {
    StoreCall::Create {
        collection: VARIANTS.to_string(),
        name: name.to_string(),
    }
}

// =========================================================================
// Idempotence
// =========================================================================

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let (store, reconciler) = create_test_env(vec![]);
    let config = variants_config();

    let first = reconciler.reconcile(&config).await.unwrap();
    assert_eq!(first.creates(), 3);
    let after_first = store.list_indexes(VARIANTS).await.unwrap();

    store.clear_journal();
    let second = reconciler.reconcile(&config).await.unwrap();

    assert_eq!(second.drops(), 0);
    assert_eq!(second.creates(), 0);
    assert!(store.mutations().is_empty());
    assert_eq!(store.list_indexes(VARIANTS).await.unwrap(), after_first);
}

#[tokio::test]
async fn test_force_rebuild_drops_and_recreates_every_run() {
    let (store, reconciler) = create_test_env(vec![]);
    let config = variants_config().force_rebuild(true);

    reconciler.reconcile(&config).await.unwrap();
    store.clear_journal();
    let second = reconciler.reconcile(&config).await.unwrap();

    assert_eq!(second.drops(), 3);
    assert_eq!(second.creates(), 3);
    assert_eq!(store.list_indexes(VARIANTS).await.unwrap().len(), 3);
}

// =========================================================================
// Post-conditions
// =========================================================================

#[tokio::test]
async fn test_every_desired_spec_is_present() {
    let (store, reconciler) = create_test_env(vec![IndexInfo::new(
        "legacy_assay",
        IndexSpec::ascending(["assaytype"]),
    )]);
    let config = variants_config();

    reconciler.reconcile(&config).await.unwrap();

    let indexes = store.list_indexes(VARIANTS).await.unwrap();
    for definition in &config.desired_indexes {
        assert!(
            indexes.find_by_spec(&definition.fields).is_some(),
            "missing {}",
            definition.fields
        );
    }
    // Existing index on the same keys already covers the key sequence; no duplicate
    assert_eq!(indexes.count_spec(&IndexSpec::ascending(["assaytype"])), 1);
    assert!(indexes.contains_name("legacy_assay"));
}

#[tokio::test]
async fn test_dropped_names_not_desired_are_absent() {
    let (store, reconciler) = create_test_env(vec![
        IndexInfo::new("by_sample", IndexSpec::ascending(["sample_id"])),
        IndexInfo::new("assaytype_1", IndexSpec::ascending(["assaytype"])),
    ]);
    let config = CollectionConfig::new(VARIANTS)
        .drop_name("by_sample")
        .ensure_spec(IndexSpec::ascending(["assaytype"]));

    let report = reconciler.reconcile(&config).await.unwrap();

    let indexes = store.list_indexes(VARIANTS).await.unwrap();
    assert!(!indexes.contains_name("by_sample"));
    assert!(indexes.contains_name("assaytype_1"));
    assert_eq!(report.drops(), 1);
    assert_eq!(report.creates(), 0);
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test]
async fn test_drop_happens_before_create_on_same_keys() {
    let keys = IndexSpec::ascending(["rsid", "assaytype"]);
    let (store, reconciler) = create_test_env(vec![IndexInfo::new("marker_idx", keys.clone())]);

    let config = CollectionConfig::new(VARIANTS)
        .drop_name("marker_idx")
        .ensure_spec(keys.clone());

    reconciler.reconcile(&config).await.unwrap();

    assert_eq!(
        store.mutations(),
        vec![drop_call("marker_idx"), create_call("rsid_1_assaytype_1")]
    );
    let indexes = store.list_indexes(VARIANTS).await.unwrap();
    assert_eq!(indexes.count_spec(&keys), 1);
}

#[tokio::test]
async fn test_all_drops_precede_all_creates() {
    let (store, reconciler) = create_test_env(vec![
        IndexInfo::new("a", IndexSpec::ascending(["rsid"])),
        IndexInfo::new("b", IndexSpec::ascending(["position"])),
    ]);
    let config = CollectionConfig::new(VARIANTS)
        .drop_name("a")
        .drop_name("b")
        .ensure_spec(IndexSpec::ascending(["rsid"]))
        .ensure_spec(IndexSpec::ascending(["position"]));

    reconciler.reconcile(&config).await.unwrap();

    let mutations = store.mutations();
    let last_drop = mutations
        .iter()
        .rposition(|c| matches!(c, StoreCall::Drop { .. }))
        .unwrap();
    let first_create = mutations
        .iter()
        .position(|c| matches!(c, StoreCall::Create { .. }))
        .unwrap();
    assert!(last_drop < first_create);
}

// =========================================================================
// Scenarios
// =========================================================================

#[tokio::test]
async fn test_rebuild_same_name_same_keys() {
    let keys = IndexSpec::ascending(["rsid", "assaytype"]);
    let (store, reconciler) =
        create_test_env(vec![IndexInfo::new("rsid_1_assaytype_1", keys.clone())]);

    let config = CollectionConfig::new(VARIANTS)
        .drop_name("rsid_1_assaytype_1")
        .ensure_spec(keys.clone());

    let report = reconciler.reconcile(&config).await.unwrap();
    assert!(report.is_success());

    let indexes = store.list_indexes(VARIANTS).await.unwrap();
    assert_eq!(indexes.count_spec(&keys), 1);
    assert_eq!(indexes.len(), 1);
}

#[tokio::test]
async fn test_rebuild_same_name_same_keys_forced() {
    let keys = IndexSpec::ascending(["rsid", "assaytype"]);
    let (store, reconciler) =
        create_test_env(vec![IndexInfo::new("rsid_1_assaytype_1", keys.clone())]);

    let config = CollectionConfig::new(VARIANTS)
        .drop_name("rsid_1_assaytype_1")
        .ensure_spec(keys.clone())
        .force_rebuild(true);

    reconciler.reconcile(&config).await.unwrap();

    assert_eq!(
        store.mutations(),
        vec![
            drop_call("rsid_1_assaytype_1"),
            create_call("rsid_1_assaytype_1")
        ]
    );
    assert_eq!(
        store.list_indexes(VARIANTS).await.unwrap().count_spec(&keys),
        1
    );
}

#[tokio::test]
async fn test_dropping_nonexistent_name_succeeds() {
    let (store, reconciler) = create_test_env(vec![]);
    let config = CollectionConfig::new(VARIANTS).drop_name("nonexistent");

    let report = reconciler.reconcile(&config).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.failures(), 0);
    assert_eq!(report.skipped(), 1);
    assert!(store.mutations().is_empty());
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn test_rejected_create_does_not_block_other_specs() {
    let (store, reconciler) = create_test_env(vec![]);
    store.reject_create("chromosome_1_position_1_assaytype_1");

    let err = reconciler.reconcile(&variants_config()).await.unwrap_err();

    let ReconcileError::IndexBuild {
        collection,
        failed,
        report,
    } = err
    else {
        panic!("expected IndexBuild error");
    };
    assert_eq!(collection, VARIANTS);
    assert_eq!(failed, 1);
    assert_eq!(report.creates(), 2);

    let failure = report.failed_records().next().unwrap();
    assert_eq!(
        failure.operation.name(),
        "chromosome_1_position_1_assaytype_1"
    );

    let indexes = store.list_indexes(VARIANTS).await.unwrap();
    assert!(indexes.contains_name("rsid_1_assaytype_1"));
    assert!(indexes.contains_name("assaytype_1"));
}

#[tokio::test]
async fn test_name_conflict_with_different_keys_is_index_build_error() {
    let (store, reconciler) = create_test_env(vec![IndexInfo::new(
        "by_marker",
        IndexSpec::ascending(["rsid"]),
    )]);
    let config = CollectionConfig::new(VARIANTS).ensure(IndexDefinition::with_options(
        IndexSpec::ascending(["rsid", "assaytype"]),
        IndexOptions::named("by_marker"),
    ));

    let err = reconciler.reconcile(&config).await.unwrap_err();
    let report = err.report();
    assert!(matches!(
        report.records[0].outcome,
        OperationOutcome::Failed(_)
    ));
    assert_eq!(store.list_indexes(VARIANTS).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connection_error_aborts_before_mutation() {
    let (store, reconciler) = create_test_env(vec![]);
    store.set_offline(true);

    let err = reconciler.reconcile(&variants_config()).await.unwrap_err();

    assert!(err.is_connection());
    assert!(err.report().records.is_empty());
    assert!(err.failed_operation().is_none());
    store.set_offline(false);
    assert!(store.mutations().is_empty());
}

#[tokio::test]
async fn test_reconcile_all_continues_past_build_errors() {
    let store = Arc::new(MemoryStore::new());
    store.reject_create("assaytype_1");
    let reconciler = IndexReconciler::new(store.clone());

    let configs = vec![
        CollectionConfig::new(VARIANTS).ensure_spec(IndexSpec::ascending(["assaytype"])),
        CollectionConfig::new("samples").ensure_spec(IndexSpec::ascending(["sample_id"])),
    ];

    let reports = reconciler.reconcile_all(&configs).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(!reports[0].is_success());
    assert!(reports[1].is_success());
    assert_eq!(
        store.list_indexes("samples").await.unwrap().names(),
        vec!["sample_id_1"]
    );
}

#[tokio::test]
async fn test_reconcile_all_stops_on_connection_error() {
    let store = Arc::new(MemoryStore::new());
    store.set_offline(true);
    let reconciler = IndexReconciler::new(store);

    let result = reconciler.reconcile_all(&[variants_config()]).await;
    assert!(matches!(result, Err(ReconcileError::Connection { .. })));
}

#[tokio::test]
async fn test_rejected_drop_is_recorded_and_run_continues() {
    let (store, reconciler) = create_test_env(vec![
        IndexInfo::new("old_a", IndexSpec::ascending(["rsid"])),
        IndexInfo::new("old_b", IndexSpec::ascending(["assaytype"])),
    ]);
    store.reject_drop("old_a");
    let config = CollectionConfig::new(VARIANTS)
        .drop_name("old_a")
        .drop_name("old_b")
        .ensure_spec(IndexSpec::ascending(["rsid"]))
        .ensure_spec(IndexSpec::ascending(["assaytype"]));

    let err = reconciler.reconcile(&config).await.unwrap_err();
    let ReconcileError::IndexBuild { failed, report, .. } = err else {
        panic!("expected IndexBuild error");
    };
    assert_eq!(failed, 1);

    let outcomes: Vec<_> = report.records.iter().map(|r| r.outcome.clone()).collect();
    assert!(matches!(outcomes[0], OperationOutcome::Failed(_)));
    assert_eq!(outcomes[1], OperationOutcome::Applied);
    // old_a survived the failed drop and still covers the rsid key
    assert_eq!(
        outcomes[2],
        OperationOutcome::Skipped("satisfied by existing index 'old_a'".into())
    );
    assert_eq!(outcomes[3], OperationOutcome::Applied);

    assert_eq!(
        store.mutations(),
        vec![drop_call("old_a"), drop_call("old_b"), create_call("assaytype_1")]
    );
    assert_eq!(
        store.list_indexes(VARIANTS).await.unwrap().names(),
        vec!["old_a", "assaytype_1"]
    );
}

#[tokio::test]
async fn test_connection_loss_mid_run_keeps_applied_operations() {
    let (store, reconciler) = create_test_env(vec![
        IndexInfo::new("old_a", IndexSpec::ascending(["position"])),
        IndexInfo::new("old_b", IndexSpec::ascending(["chromosome"])),
    ]);
    let config = CollectionConfig::new(VARIANTS)
        .drop_name("old_a")
        .drop_name("old_b")
        .ensure_spec(IndexSpec::ascending(["rsid"]))
        .ensure_spec(IndexSpec::ascending(["assaytype"]));
    // list, drop, drop, list, create; the second create never lands
    store.fail_after(5);

    let err = reconciler.reconcile(&config).await.unwrap_err();

    assert!(err.is_connection());
    assert_eq!(err.failed_operation().map(|op| op.name()), Some("assaytype_1"));
    assert!(err.to_string().contains("create index 'assaytype_1'"));

    let report = err.report();
    assert_eq!(report.drops(), 2);
    assert_eq!(report.creates(), 1);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.records[2].operation.name(), "rsid_1");

    store.set_offline(false);
    assert_eq!(
        store.list_indexes(VARIANTS).await.unwrap().names(),
        vec!["rsid_1"]
    );
}

#[tokio::test]
async fn test_reconcile_all_connection_error_keeps_finished_collections() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = IndexReconciler::new(store.clone());
    let configs = vec![
        CollectionConfig::new("samples").ensure_spec(IndexSpec::ascending(["sample_id"])),
        variants_config(),
    ];
    // samples: list, list, create; variants fails on its first list
    store.fail_after(3);

    let err = reconciler.reconcile_all(&configs).await.unwrap_err();

    assert!(err.is_connection());
    assert_eq!(err.completed().len(), 1);
    assert_eq!(err.completed()[0].collection, "samples");
    assert_eq!(err.completed()[0].creates(), 1);
    assert_eq!(err.report().collection, VARIANTS);
    assert!(err.report().records.is_empty());
}

#[tokio::test]
async fn test_reconciler_over_trait_object() {
    let store: Arc<dyn IndexStore> = Arc::new(MemoryStore::new());
    let reconciler = IndexReconciler::new(store.clone());

    let report = reconciler.reconcile(&variants_config()).await.unwrap();
    assert_eq!(report.creates(), 3);
    assert_eq!(store.list_indexes(VARIANTS).await.unwrap().len(), 3);
}
