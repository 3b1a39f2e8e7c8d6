//! Reconciliation configuration
//!
//! A configuration file names a storage engine connection and, per
//! collection, the indexes to drop and the indexes that must exist. It
//! replaces a hard-coded index script with data:
//!
//! ```json
//! {
//!   "connection": { "endpoint": "rocksdb://./data/godb", "namespace": "godb", "database": "godb" },
//!   "collections": [
//!     {
//!       "collection": "variants",
//!       "drop_names": ["rsid_1_assaytype_1"],
//!       "desired_indexes": [ { "fields": [["rsid", 1], ["assaytype", 1]] } ]
//!     }
//!   ]
//! }
//! ```

use crate::models::{IndexDefinition, IndexSpec, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_ENDPOINT: &str = "rocksdb://./data";
const DEFAULT_NAMESPACE: &str = "indexsync";
const DEFAULT_DATABASE: &str = "indexsync";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// How to reach the storage engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Engine endpoint (`rocksdb://<path>`, `http://host:port`)
    pub endpoint: String,

    pub namespace: String,

    pub database: String,

    /// Root user; no sign-in is attempted when absent
    pub username: Option<String>,

    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            username: None,
            password: None,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("connection.endpoint cannot be empty"));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::invalid("connection.namespace cannot be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::invalid("connection.database cannot be empty"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::invalid(
                "connection.password is set but connection.username is missing",
            ));
        }
        Ok(())
    }
}

/// Desired index state of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub collection: String,

    /// Named indexes eligible for removal
    #[serde(default)]
    pub drop_names: Vec<String>,

    /// Full target list of index definitions
    #[serde(default)]
    pub desired_indexes: Vec<IndexDefinition>,

    /// Drop listed names even when they already match a desired definition
    #[serde(default)]
    pub force_rebuild: bool,
}

impl CollectionConfig {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            drop_names: Vec::new(),
            desired_indexes: Vec::new(),
            force_rebuild: false,
        }
    }

    pub fn drop_name(mut self, name: impl Into<String>) -> Self {
        self.drop_names.push(name.into());
        self
    }

    pub fn ensure(mut self, definition: IndexDefinition) -> Self {
        self.desired_indexes.push(definition);
        self
    }

    pub fn ensure_spec(self, spec: IndexSpec) -> Self {
        self.ensure(IndexDefinition::new(spec))
    }

    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.is_empty()
            || !self
                .collection
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(ConfigError::invalid(format!(
                "Invalid collection name '{}': must contain only alphanumeric characters and underscores",
                self.collection
            )));
        }

        if let Some(blank) = self.drop_names.iter().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::invalid(format!(
                "Collection '{}': drop name '{}' cannot be blank",
                self.collection, blank
            )));
        }

        let mut names: HashMap<String, &IndexSpec> = HashMap::new();
        for (position, definition) in self.desired_indexes.iter().enumerate() {
            definition.validate().map_err(|e: SpecError| {
                ConfigError::invalid(format!(
                    "Collection '{}', desired index #{}: {}",
                    self.collection,
                    position + 1,
                    e
                ))
            })?;

            let name = definition.resolved_name();
            if let Some(existing) = names.get(&name) {
                if *existing != &definition.fields {
                    return Err(ConfigError::invalid(format!(
                        "Collection '{}': index name '{}' is used for both {} and {}",
                        self.collection, name, existing, definition.fields
                    )));
                }
            }
            names.insert(name, &definition.fields);
        }

        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    pub collections: Vec<CollectionConfig>,
}

impl ReconcileConfig {
    /// Read and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;

        tracing::debug!(
            "Loaded {} collection(s) from {}",
            config.collections.len(),
            path.display()
        );

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.connection.validate()?;

        if self.collections.is_empty() {
            return Err(ConfigError::invalid("at least one collection is required"));
        }

        let mut seen = HashSet::new();
        for collection in &self.collections {
            collection.validate()?;
            if !seen.insert(collection.collection.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "Collection '{}' is configured more than once",
                    collection.collection
                )));
            }
        }

        Ok(())
    }

    /// Restrict the configuration to a single collection
    pub fn select(&self, collection: &str) -> Result<Vec<CollectionConfig>, ConfigError> {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map(|c| vec![c.clone()])
            .ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Collection '{}' is not present in the configuration",
                    collection
                ))
            })
    }
}
