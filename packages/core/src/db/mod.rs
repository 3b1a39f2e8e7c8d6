//! Database Layer
//!
//! This module handles all interaction with the storage engine's index
//! catalog:
//!
//! - `IndexStore` - the list / drop / create abstraction the reconciler uses
//! - `SurrealStore` - SurrealDB backend (embedded RocksDB or remote HTTP)
//! - `MemoryStore` - in-process backend with a request journal
//! - `IndexDdl` - SurrealQL generation and `INFO FOR TABLE` parsing

mod error;
pub mod index_ddl;
mod index_store;
mod memory_store;
mod surreal_store;

pub use error::StoreError;
pub use index_ddl::IndexDdl;
pub use index_store::IndexStore;
pub use memory_store::{MemoryStore, StoreCall};
pub use surreal_store::SurrealStore;
