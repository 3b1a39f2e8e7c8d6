//! Data Models
//!
//! This module contains the engine-independent description of secondary
//! indexes:
//!
//! - `IndexSpec` - Ordered key sequence that identifies an index
//! - `IndexDefinition` - A desired index (spec plus creation options)
//! - `IndexInfo` / `IndexSet` - The live catalog reported by a store

mod index_spec;

pub use index_spec::{
    IndexDefinition, IndexInfo, IndexKey, IndexOptions, IndexSet, IndexSpec, SortDirection,
    SpecError,
};
