//! Services
//!
//! - `IndexReconciler` - drop-then-ensure reconciliation of a collection's
//!   secondary indexes against an `IndexStore`

pub mod error;
pub mod index_reconciler;

pub use error::ReconcileError;
pub use index_reconciler::{
    IndexOperation, IndexReconciler, OperationOutcome, OperationRecord, ReconcilePlan,
    ReconcileReport,
};
