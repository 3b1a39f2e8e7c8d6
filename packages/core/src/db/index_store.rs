//! IndexStore Trait - Index Catalog Abstraction
//!
//! This module defines the `IndexStore` trait, the only surface the
//! reconciler needs from a storage engine: list, drop, and create secondary
//! indexes on a named collection.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: Methods are async so embedded and network backends
//!    share one interface
//! 2. **Typed Errors**: Methods return [`StoreError`] so callers can tell a
//!    dead connection from a single rejected request
//! 3. **Explicit Handle**: Stores are passed to the reconciler, never looked
//!    up from ambient state, which keeps an in-memory store usable in tests
//!
//! # Examples
//!
//! ```rust
//! use indexsync_core::db::{IndexStore, MemoryStore};
//! use indexsync_core::models::{IndexOptions, IndexSpec};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let spec = IndexSpec::ascending(["rsid", "assaytype"]);
//!
//! let name = store
//!     .create_index("variants", &spec, &IndexOptions::default())
//!     .await?;
//! assert_eq!(name, "rsid_1_assaytype_1");
//!
//! let indexes = store.list_indexes("variants").await?;
//! assert!(indexes.find_by_spec(&spec).is_some());
//! # Ok(())
//! # }
//! ```

use crate::db::StoreError;
use crate::models::{IndexOptions, IndexSet, IndexSpec};
use async_trait::async_trait;

/// Abstraction over a storage engine's secondary-index catalog
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a store can be shared behind an
/// `Arc` across tasks.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// List the secondary indexes currently defined on `collection`
    ///
    /// A collection with no indexes (or that does not exist yet) yields an
    /// empty set.
    async fn list_indexes(&self, collection: &str) -> Result<IndexSet, StoreError>;

    /// Drop the index called `name`
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such index exists
    /// - `Connection` if the engine is unreachable
    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError>;

    /// Create an index over `spec`
    ///
    /// The index is named `options.name`, or `spec.default_name()` when no
    /// name is given. Returns the name used.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the engine rejects the definition (for example a
    ///   name already in use)
    /// - `Connection` if the engine is unreachable
    async fn create_index(
        &self,
        collection: &str,
        spec: &IndexSpec,
        options: &IndexOptions,
    ) -> Result<String, StoreError>;
}
