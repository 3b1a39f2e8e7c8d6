//! Service Layer Error Types
//!
//! A reconciliation run fails in one of two ways: the storage engine cannot
//! be reached (fatal, the run stops at once), or one or more individual
//! drop/create requests were rejected (the run finished every other item
//! first). Both carry the report of what was done before the run ended.

use crate::db::StoreError;
use crate::services::{IndexOperation, ReconcileReport};
use chrono::Utc;
use thiserror::Error;

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Storage engine unreachable; nothing after the failing request ran
    #[error(
        "Connection error on collection '{collection}'{}: {source}",
        failing_operation(.operation)
    )]
    Connection {
        collection: String,
        /// Request in flight when the connection was lost; `None` for a
        /// catalog read
        operation: Option<Box<IndexOperation>>,
        source: StoreError,
        /// Operations that completed before the abort
        report: Box<ReconcileReport>,
        /// Reports of collections finished earlier in a multi-collection run
        completed: Vec<ReconcileReport>,
    },

    /// At least one drop or create request was rejected
    #[error("{failed} index operation(s) failed on collection '{collection}'")]
    IndexBuild {
        collection: String,
        failed: usize,
        report: Box<ReconcileReport>,
    },
}

fn failing_operation(operation: &Option<Box<IndexOperation>>) -> String {
    match operation {
        Some(op) => format!(" during {}", op),
        None => String::new(),
    }
}

impl ReconcileError {
    /// Create a connection error raised before any operation ran
    pub fn connection(collection: impl Into<String>, source: StoreError) -> Self {
        let collection = collection.into();
        let now = Utc::now();
        Self::Connection {
            report: Box::new(ReconcileReport {
                collection: collection.clone(),
                started_at: now,
                finished_at: now,
                records: Vec::new(),
            }),
            collection,
            operation: None,
            source,
            completed: Vec::new(),
        }
    }

    /// Create a connection error from a partially executed run
    pub fn aborted(
        report: ReconcileReport,
        operation: Option<IndexOperation>,
        source: StoreError,
    ) -> Self {
        Self::Connection {
            collection: report.collection.clone(),
            operation: operation.map(Box::new),
            source,
            report: Box::new(report),
            completed: Vec::new(),
        }
    }

    /// Create an index build error from a finished report
    pub fn index_build(report: ReconcileReport) -> Self {
        Self::IndexBuild {
            collection: report.collection.clone(),
            failed: report.failures(),
            report: Box::new(report),
        }
    }

    /// Attach reports of collections that finished before this error
    pub fn with_completed(mut self, reports: Vec<ReconcileReport>) -> Self {
        if let Self::Connection { completed, .. } = &mut self {
            *completed = reports;
        }
        self
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Report of the collection the run ended on
    ///
    /// For connection errors this holds only the operations that completed
    /// before the abort.
    pub fn report(&self) -> &ReconcileReport {
        match self {
            Self::Connection { report, .. } | Self::IndexBuild { report, .. } => report,
        }
    }

    /// Request in flight when the connection was lost
    pub fn failed_operation(&self) -> Option<&IndexOperation> {
        match self {
            Self::Connection { operation, .. } => operation.as_deref(),
            Self::IndexBuild { .. } => None,
        }
    }

    /// Reports of collections completed before a connection abort
    pub fn completed(&self) -> &[ReconcileReport] {
        match self {
            Self::Connection { completed, .. } => completed,
            Self::IndexBuild { .. } => &[],
        }
    }
}
