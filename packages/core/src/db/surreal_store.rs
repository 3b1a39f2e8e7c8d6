//! SurrealStore - IndexStore Implementation for SurrealDB
//!
//! This module implements the `IndexStore` trait on top of a SurrealDB
//! connection. A collection maps to a SurrealDB table; secondary indexes are
//! managed with `DEFINE INDEX` / `REMOVE INDEX` and read back with
//! `INFO FOR TABLE`.
//!
//! # Engines
//!
//! - **Embedded RocksDB** (`kv-rocksdb`): `SurrealStore::embedded(path)`
//! - **Remote HTTP** (`protocol-http`): `SurrealStore::connect(&config)` with
//!   an `http://` or `https://` endpoint
//!
//! `connect` picks the engine from the endpoint scheme, so
//! `rocksdb://./data` works there as well.
//!
//! # Examples
//!
//! ```rust,no_run
//! use indexsync_core::config::ConnectionConfig;
//! use indexsync_core::db::{IndexStore, SurrealStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SurrealStore::connect(&ConnectionConfig::default()).await?;
//!     let indexes = store.list_indexes("variants").await?;
//!     println!("{} indexes", indexes.len());
//!     Ok(())
//! }
//! ```

use crate::config::ConnectionConfig;
use crate::db::{IndexDdl, IndexStore, StoreError};
use crate::models::{IndexOptions, IndexSet, IndexSpec};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use surrealdb::engine::any::Any;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

/// SurrealStore implements IndexStore for SurrealDB
pub struct SurrealStore<C = Any>
where
    C: surrealdb::Connection,
{
    db: Arc<Surreal<C>>,
    ddl: IndexDdl,
}

impl<C> SurrealStore<C>
where
    C: surrealdb::Connection,
{
    /// Wrap an already-connected client
    ///
    /// The client must already have a namespace and database selected.
    pub fn new(db: Arc<Surreal<C>>) -> Self {
        Self {
            db,
            ddl: IndexDdl::new(),
        }
    }

    /// Underlying SurrealDB client
    pub fn db(&self) -> &Arc<Surreal<C>> {
        &self.db
    }
}

impl SurrealStore<Db> {
    /// Open an embedded RocksDB store
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database path is invalid
    /// - RocksDB initialization fails
    pub async fn embedded(db_path: PathBuf, namespace: &str, database: &str) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .context("Failed to initialize SurrealDB with RocksDB backend")?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .context("Failed to set namespace/database")?;

        Ok(Self::new(Arc::new(db)))
    }
}

impl SurrealStore<Any> {
    /// Connect using the engine implied by `config.endpoint`
    ///
    /// Signs in as a root user when credentials are configured.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .with_context(|| format!("Failed to connect to SurrealDB at {}", config.endpoint))?;

        if let Some(username) = &config.username {
            db.signin(Root {
                username,
                password: config.password.as_deref().unwrap_or_default(),
            })
            .await
            .with_context(|| format!("Failed to sign in to SurrealDB as '{}'", username))?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .context("Failed to set namespace/database")?;

        tracing::debug!(
            "Connected to {} (ns: {}, db: {})",
            config.endpoint,
            config.namespace,
            config.database
        );

        Ok(Self::new(Arc::new(db)))
    }
}

#[async_trait]
impl<C> IndexStore for SurrealStore<C>
where
    C: surrealdb::Connection,
{
    async fn list_indexes(&self, collection: &str) -> Result<IndexSet, StoreError> {
        let query = self.ddl.info_for_table(collection)?;

        let mut response = self
            .db
            .query(query)
            .await
            .map_err(|e| self.ddl.classify_query_error(collection, "*", &e.to_string()))?;

        let info: Option<Value> = match response.take(0) {
            Ok(info) => info,
            Err(e) => {
                let err = self.ddl.classify_error(collection, "*", &e.to_string());
                // Table not created yet: nothing is indexed
                if err.is_not_found() {
                    return Ok(IndexSet::default());
                }
                return Err(err);
            }
        };

        let Some(Value::Object(indexes)) = info.as_ref().and_then(|i| i.get("indexes")) else {
            return Ok(IndexSet::default());
        };

        let mut parsed = Vec::with_capacity(indexes.len());
        for (name, definition) in indexes {
            let Some(statement) = definition.as_str() else {
                tracing::warn!("Skipping index '{}' with non-text definition", name);
                continue;
            };
            match self.ddl.parse_index_definition(statement) {
                Some(info) => parsed.push(info),
                None => tracing::warn!(
                    "Could not parse definition of index '{}': {}",
                    name,
                    statement
                ),
            }
        }

        Ok(IndexSet::new(parsed))
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        let query = self.ddl.remove_index(collection, name)?;

        let response = self
            .db
            .query(query)
            .await
            .map_err(|e| self.ddl.classify_query_error(collection, name, &e.to_string()))?;

        response
            .check()
            .map_err(|e| self.ddl.classify_error(collection, name, &e.to_string()))?;

        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        spec: &IndexSpec,
        options: &IndexOptions,
    ) -> Result<String, StoreError> {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| spec.default_name());
        let query = self.ddl.define_index(collection, &name, spec, options)?;

        let response = self
            .db
            .query(query)
            .await
            .map_err(|e| self.ddl.classify_query_error(collection, &name, &e.to_string()))?;

        response
            .check()
            .map_err(|e| self.ddl.classify_error(collection, &name, &e.to_string()))?;

        Ok(name)
    }
}
