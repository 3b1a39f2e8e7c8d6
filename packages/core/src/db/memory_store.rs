//! MemoryStore - In-Process IndexStore
//!
//! Keeps per-collection index catalogs in memory and journals every request
//! it receives, so callers can assert on request ordering. It enforces the
//! same rules a real engine does: names are unique per collection, dropping
//! a missing name is `NotFound`, and an unreachable store fails every call.

use crate::db::{IndexStore, StoreError};
use crate::models::{IndexInfo, IndexOptions, IndexSet, IndexSpec};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A request received by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { collection: String },
    Drop { collection: String, name: String },
    Create { collection: String, name: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<IndexInfo>>,
    journal: Vec<StoreCall>,
    rejected_creates: HashSet<String>,
    rejected_drops: HashSet<String>,
    offline: bool,
    /// Requests served before the store goes offline
    remaining: Option<usize>,
}

/// In-memory index catalog
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing index without journaling it
    pub fn with_index(self, collection: &str, info: IndexInfo) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(info);
        }
        self
    }

    /// Make every subsequent request fail with a connection error
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
            state.remaining = None;
        }
    }

    /// Make creation of an index with this name fail with a conflict
    pub fn reject_create(&self, name: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_creates.insert(name.into());
        }
    }

    /// Make dropping the index with this name fail; the index stays in place
    pub fn reject_drop(&self, name: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_drops.insert(name.into());
        }
    }

    /// Serve `requests` more requests, then fail every one after with a
    /// connection error
    pub fn fail_after(&self, requests: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.remaining = Some(requests);
        }
    }

    /// Requests received so far, in arrival order
    pub fn journal(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .map(|state| state.journal.clone())
            .unwrap_or_default()
    }

    /// Mutating requests (drops and creates) received so far
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.journal()
            .into_iter()
            .filter(|call| !matches!(call, StoreCall::List { .. }))
            .collect()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.journal.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::operation("memory store lock poisoned"))?;
        match state.remaining {
            Some(0) => state.offline = true,
            Some(n) => state.remaining = Some(n - 1),
            None => {}
        }
        if state.offline {
            return Err(StoreError::connection("memory store is offline"));
        }
        Ok(state)
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn list_indexes(&self, collection: &str) -> Result<IndexSet, StoreError> {
        let mut state = self.lock()?;
        state.journal.push(StoreCall::List {
            collection: collection.to_string(),
        });

        Ok(state
            .collections
            .get(collection)
            .map(|indexes| IndexSet::new(indexes.clone()))
            .unwrap_or_default())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.journal.push(StoreCall::Drop {
            collection: collection.to_string(),
            name: name.to_string(),
        });

        if state.rejected_drops.contains(name) {
            return Err(StoreError::operation(format!(
                "removal of index '{}' on '{}' rejected by engine",
                name, collection
            )));
        }

        let indexes = state.collections.entry(collection.to_string()).or_default();
        let before = indexes.len();
        indexes.retain(|info| info.name != name);

        if indexes.len() == before {
            return Err(StoreError::not_found(collection, name));
        }
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        spec: &IndexSpec,
        options: &IndexOptions,
    ) -> Result<String, StoreError> {
        let mut state = self.lock()?;
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| spec.default_name());
        state.journal.push(StoreCall::Create {
            collection: collection.to_string(),
            name: name.clone(),
        });

        if state.rejected_creates.contains(&name) {
            return Err(StoreError::conflict(
                collection,
                &name,
                "creation rejected by engine",
            ));
        }

        let indexes = state.collections.entry(collection.to_string()).or_default();
        if indexes.iter().any(|info| info.name == name) {
            return Err(StoreError::conflict(
                collection,
                &name,
                "an index with this name already exists",
            ));
        }

        indexes.push(IndexInfo {
            name: name.clone(),
            spec: spec.clone(),
            unique: options.unique,
        });
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_list() {
        let store = MemoryStore::new();
        let spec = IndexSpec::ascending(["assaytype"]);

        let name = store
            .create_index("variants", &spec, &IndexOptions::default())
            .await
            .unwrap();
        assert_eq!(name, "assaytype_1");

        let set = store.list_indexes("variants").await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(store.list_indexes("samples").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.drop_index("variants", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let store = MemoryStore::new().with_index(
            "variants",
            IndexInfo::new("by_rsid", IndexSpec::ascending(["rsid"])),
        );

        let err = store
            .create_index(
                "variants",
                &IndexSpec::ascending(["assaytype"]),
                &IndexOptions::named("by_rsid"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_offline_fails_with_connection_error() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.list_indexes("variants").await.unwrap_err();
        assert!(err.is_connection());
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_drop_keeps_index() {
        let store = MemoryStore::new().with_index(
            "variants",
            IndexInfo::new("by_rsid", IndexSpec::ascending(["rsid"])),
        );
        store.reject_drop("by_rsid");

        let err = store.drop_index("variants", "by_rsid").await.unwrap_err();
        assert!(matches!(err, StoreError::Operation(_)));
        assert!(store
            .list_indexes("variants")
            .await
            .unwrap()
            .contains_name("by_rsid"));
    }

    #[tokio::test]
    async fn test_fail_after_goes_offline() {
        let store = MemoryStore::new();
        store.fail_after(2);

        store.list_indexes("variants").await.unwrap();
        store.list_indexes("variants").await.unwrap();
        assert!(store.list_indexes("variants").await.unwrap_err().is_connection());
        assert_eq!(store.journal().len(), 2);

        store.set_offline(false);
        assert!(store.list_indexes("variants").await.is_ok());
    }

    #[tokio::test]
    async fn test_journal_records_order() {
        let store = MemoryStore::new().with_index(
            "variants",
            IndexInfo::new("assaytype_1", IndexSpec::ascending(["assaytype"])),
        );

        store.drop_index("variants", "assaytype_1").await.unwrap();
        store
            .create_index(
                "variants",
                &IndexSpec::ascending(["assaytype"]),
                &IndexOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            store.mutations(),
            vec![
                StoreCall::Drop {
                    collection: "variants".into(),
                    name: "assaytype_1".into()
                },
                StoreCall::Create {
                    collection: "variants".into(),
                    name: "assaytype_1".into()
                },
            ]
        );
    }
}
