//! indexsync Core
//!
//! Declarative secondary-index lifecycle management for collection stores.
//! Given a collection, a list of index names eligible for removal, and the
//! full list of indexes that must exist, the reconciler drops first, then
//! creates whatever key sequences are missing.
//!
//! # Modules
//!
//! - [`models`] - Index specifications and catalog snapshots
//! - [`db`] - `IndexStore` abstraction with SurrealDB and in-memory backends
//! - [`services`] - `IndexReconciler`
//! - [`config`] - Declarative configuration files

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{CollectionConfig, ConfigError, ConnectionConfig, ReconcileConfig};
pub use db::{IndexStore, MemoryStore, StoreError, SurrealStore};
pub use models::*;
pub use services::*;
