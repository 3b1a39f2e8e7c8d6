//! Index Specification Types
//!
//! This module defines the logical description of a secondary index,
//! independent of the storage engine that materializes it.
//!
//! # Identity
//!
//! An index is identified by its **key sequence**: the ordered list of
//! `(field, direction)` pairs. Names are secondary. Two specs are equal only
//! when every pair matches in the same order, so `{rsid, assaytype}` and
//! `{assaytype, rsid}` are different indexes.
//!
//! # Examples
//!
//! ```rust
//! use indexsync_core::models::{IndexSpec, SortDirection};
//!
//! let spec = IndexSpec::ascending(["rsid", "assaytype"]);
//! assert_eq!(spec.default_name(), "rsid_1_assaytype_1");
//!
//! let by_position = IndexSpec::new(vec![
//!     ("chromosome", SortDirection::Ascending).into(),
//!     ("position", SortDirection::Descending).into(),
//! ]);
//! assert_eq!(by_position.key_pattern(), "chromosome:1,position:-1");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Validation errors for index definitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("Index specification has no fields")]
    EmptySpec,

    #[error("Field '{0}' appears more than once in index specification")]
    DuplicateField(String),

    #[error("Invalid field path '{0}': segments must be non-empty identifiers separated by '.'")]
    InvalidField(String),

    #[error("Invalid sort direction {0}: expected 1 or -1")]
    InvalidDirection(i64),

    #[error("Invalid key pattern '{0}'")]
    InvalidKeyPattern(String),

    #[error("Index name cannot be empty")]
    EmptyName,
}

/// Sort direction of a single index key
///
/// Serialized as the integers `1` and `-1`, matching the notation used by
/// document-store index definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i64(self) -> i64 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

impl TryFrom<i64> for SortDirection {
    type Error = SpecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SortDirection::Ascending),
            -1 => Ok(SortDirection::Descending),
            other => Err(SpecError::InvalidDirection(other)),
        }
    }
}

impl From<SortDirection> for i64 {
    fn from(direction: SortDirection) -> Self {
        direction.as_i64()
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// One `(field, direction)` pair of an index key sequence
///
/// Serialized as a two-element array: `["rsid", 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, SortDirection)", into = "(String, SortDirection)")]
pub struct IndexKey {
    pub field: String,
    pub direction: SortDirection,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Descending)
    }
}

impl From<(String, SortDirection)> for IndexKey {
    fn from((field, direction): (String, SortDirection)) -> Self {
        Self { field, direction }
    }
}

impl From<(&str, SortDirection)> for IndexKey {
    fn from((field, direction): (&str, SortDirection)) -> Self {
        Self::new(field, direction)
    }
}

impl From<IndexKey> for (String, SortDirection) {
    fn from(key: IndexKey) -> Self {
        (key.field, key.direction)
    }
}

/// Ordered key sequence identifying an index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSpec {
    keys: Vec<IndexKey>,
}

impl IndexSpec {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self { keys }
    }

    /// Build an all-ascending spec from field names
    pub fn ascending<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: fields.into_iter().map(IndexKey::ascending).collect(),
        }
    }

    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.field.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Conventional auto-generated index name (`rsid_1_assaytype_1`)
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Textual key pattern (`rsid:1,assaytype:1`)
    ///
    /// Field paths may contain `.` but never `:` or `,`, so the encoding is
    /// unambiguous once the spec has passed [`IndexSpec::validate`].
    pub fn key_pattern(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}:{}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse the output of [`IndexSpec::key_pattern`]
    pub fn parse_key_pattern(pattern: &str) -> Result<Self, SpecError> {
        let invalid = || SpecError::InvalidKeyPattern(pattern.to_string());

        let mut keys = Vec::new();
        for item in pattern.split(',') {
            let (field, direction) = item.trim().rsplit_once(':').ok_or_else(invalid)?;
            let direction: i64 = direction.trim().parse().map_err(|_| invalid())?;
            keys.push(IndexKey::new(
                field.trim(),
                SortDirection::try_from(direction)?,
            ));
        }

        let spec = Self { keys };
        spec.validate()?;
        Ok(spec)
    }

    /// Check that the spec is non-empty, has no repeated fields, and that
    /// every field path is made of identifier segments
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.keys.is_empty() {
            return Err(SpecError::EmptySpec);
        }

        let mut seen = std::collections::HashSet::new();
        for key in &self.keys {
            if !is_valid_field_path(&key.field) {
                return Err(SpecError::InvalidField(key.field.clone()));
            }
            if !seen.insert(key.field.as_str()) {
                return Err(SpecError::DuplicateField(key.field.clone()));
            }
        }

        Ok(())
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .keys
            .iter()
            .map(|k| format!("{}: {}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{{{}}}", body)
    }
}

fn is_valid_field_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
}

/// Non-functional creation options
///
/// None of these participate in index identity. `name` overrides the
/// auto-generated name; `background` requests a non-blocking build where
/// the engine supports one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unique: bool,
    pub background: bool,
}

impl IndexOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// One desired index: key sequence plus creation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub fields: IndexSpec,
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexDefinition {
    pub fn new(fields: IndexSpec) -> Self {
        Self {
            fields,
            options: IndexOptions::default(),
        }
    }

    pub fn with_options(fields: IndexSpec, options: IndexOptions) -> Self {
        Self { fields, options }
    }

    /// Name the index will be created under
    pub fn resolved_name(&self) -> String {
        self.options
            .name
            .clone()
            .unwrap_or_else(|| self.fields.default_name())
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        self.fields.validate()?;
        if matches!(&self.options.name, Some(name) if name.trim().is_empty()) {
            return Err(SpecError::EmptyName);
        }
        Ok(())
    }

    /// True when `info` is exactly what creating this definition would produce
    pub fn matches(&self, info: &IndexInfo) -> bool {
        info.spec == self.fields
            && info.unique == self.options.unique
            && info.name == self.resolved_name()
    }
}

/// An index as reported by the storage engine's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub spec: IndexSpec,
    #[serde(default)]
    pub unique: bool,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, spec: IndexSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            unique: false,
        }
    }
}

/// Indexes currently defined on a collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSet {
    indexes: Vec<IndexInfo>,
}

impl IndexSet {
    pub fn new(indexes: Vec<IndexInfo>) -> Self {
        Self { indexes }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indexes.iter()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// First index whose key sequence equals `spec`
    pub fn find_by_spec(&self, spec: &IndexSpec) -> Option<&IndexInfo> {
        self.indexes.iter().find(|i| &i.spec == spec)
    }

    pub fn count_spec(&self, spec: &IndexSpec) -> usize {
        self.indexes.iter().filter(|i| &i.spec == spec).count()
    }

    pub fn names(&self) -> Vec<&str> {
        self.indexes.iter().map(|i| i.name.as_str()).collect()
    }
}

impl FromIterator<IndexInfo> for IndexSet {
    fn from_iter<T: IntoIterator<Item = IndexInfo>>(iter: T) -> Self {
        Self {
            indexes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for IndexSet {
    type Item = IndexInfo;
    type IntoIter = std::vec::IntoIter<IndexInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.indexes.into_iter()
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "index_spec_test.rs"]
mod index_spec_test;
