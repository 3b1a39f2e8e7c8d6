//! Index DDL
//!
//! Generates the SurrealQL statements that manage secondary indexes and
//! parses the index definitions SurrealDB reports back from
//! `INFO FOR TABLE`.
//!
//! ## Key directions
//!
//! SurrealDB indexes have no per-field sort direction. To keep key-sequence
//! identity stable across a define/list cycle, the full key pattern is
//! stored in the index comment (`key_pattern=rsid:1,assaytype:-1`). An
//! index without such a comment is read back as all-ascending.
//!
//! ## Example
//!
//! ```ignore
//! // DEFINE INDEX rsid_1_assaytype_1 ON TABLE variants FIELDS rsid, assaytype COMMENT 'key_pattern=rsid:1,assaytype:1';
//! // REMOVE INDEX rsid_1_assaytype_1 ON TABLE variants;
//! ```

use crate::db::StoreError;
use crate::models::{IndexInfo, IndexKey, IndexOptions, IndexSpec, SortDirection};
use regex::Regex;
use std::sync::OnceLock;

/// Comment prefix carrying the key pattern of an index
pub const KEY_PATTERN_PREFIX: &str = "key_pattern=";

const DEFINE_INDEX_PATTERN: &str = r"(?is)^\s*DEFINE\s+INDEX\s+(?:IF\s+NOT\s+EXISTS\s+|OVERWRITE\s+)?(?P<name>`(?:[^`\\]|\\.)*`|⟨[^⟩]*⟩|\S+)\s+ON\s+(?:TABLE\s+)?(?P<table>\S+)\s+(?:FIELDS|COLUMNS)\s+(?P<fields>.+?)(?P<rest>\s+(?:UNIQUE|SEARCH|MTREE|HNSW|COMMENT|CONCURRENTLY)\b.*)?\s*;?\s*$";

const COMMENT_PATTERN: &str = r#"(?is)\bCOMMENT\s+(?:'(?P<single>[^']*)'|"(?P<double>[^"]*)")"#;

const UNIQUE_PATTERN: &str = r"(?i)\bUNIQUE\b";

fn define_index_regex() -> &'static Regex {
    static DEFINE_INDEX_REGEX: OnceLock<Regex> = OnceLock::new();
    DEFINE_INDEX_REGEX.get_or_init(|| Regex::new(DEFINE_INDEX_PATTERN).unwrap())
}

fn comment_regex() -> &'static Regex {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    COMMENT_REGEX.get_or_init(|| Regex::new(COMMENT_PATTERN).unwrap())
}

fn unique_regex() -> &'static Regex {
    static UNIQUE_REGEX: OnceLock<Regex> = OnceLock::new();
    UNIQUE_REGEX.get_or_init(|| Regex::new(UNIQUE_PATTERN).unwrap())
}

/// Pure SurrealQL generator and parser for secondary indexes
///
/// `IndexDdl` is stateless and does not hold database connections.
/// Statement execution is the responsibility of the caller (typically
/// `SurrealStore`).
#[derive(Default)]
pub struct IndexDdl;

impl IndexDdl {
    pub fn new() -> Self {
        Self
    }

    /// Generate `DEFINE INDEX` for a spec
    ///
    /// # Generated DDL Pattern
    ///
    /// ```ignore
    /// // DEFINE INDEX <name> ON TABLE <table> FIELDS <f1>, <f2> [UNIQUE] COMMENT '<key pattern>' [CONCURRENTLY];
    /// ```
    pub fn define_index(
        &self,
        table: &str,
        name: &str,
        spec: &IndexSpec,
        options: &IndexOptions,
    ) -> Result<String, StoreError> {
        Self::validate_table_name(table)?;
        spec.validate()
            .map_err(|e| StoreError::operation(format!("Index '{}': {}", name, e)))?;
        if name.trim().is_empty() {
            return Err(StoreError::operation("Index name cannot be empty"));
        }

        let fields = spec
            .fields()
            .map(quote_field_path)
            .collect::<Vec<_>>()
            .join(", ");

        let mut statement = format!(
            "DEFINE INDEX {} ON TABLE {} FIELDS {}",
            quote_ident(name),
            quote_ident(table),
            fields
        );

        if options.unique {
            statement.push_str(" UNIQUE");
        }

        statement.push_str(&format!(
            " COMMENT '{}{}'",
            KEY_PATTERN_PREFIX,
            spec.key_pattern()
        ));

        if options.background {
            statement.push_str(" CONCURRENTLY");
        }

        statement.push(';');
        Ok(statement)
    }

    /// Generate `REMOVE INDEX`
    pub fn remove_index(&self, table: &str, name: &str) -> Result<String, StoreError> {
        Self::validate_table_name(table)?;
        Ok(format!(
            "REMOVE INDEX {} ON TABLE {};",
            quote_ident(name),
            quote_ident(table)
        ))
    }

    /// Generate the catalog query for a table
    pub fn info_for_table(&self, table: &str) -> Result<String, StoreError> {
        Self::validate_table_name(table)?;
        Ok(format!("INFO FOR TABLE {};", quote_ident(table)))
    }

    /// Parse one `DEFINE INDEX` statement as reported by `INFO FOR TABLE`
    ///
    /// Returns `None` for statements that are not index definitions.
    pub fn parse_index_definition(&self, statement: &str) -> Option<IndexInfo> {
        let captures = define_index_regex().captures(statement)?;

        let name = unquote_ident(captures.name("name")?.as_str());
        let fields: Vec<String> = split_fields(captures.name("fields")?.as_str())
            .into_iter()
            .map(|f| unquote_field_path(&f))
            .collect();
        if fields.is_empty() {
            return None;
        }

        let rest = captures.name("rest").map(|m| m.as_str()).unwrap_or("");
        let comment = comment_regex().captures(rest).and_then(|c| {
            c.name("single")
                .or_else(|| c.name("double"))
                .map(|m| m.as_str().to_string())
        });

        let before_comment = match comment_regex().find(rest) {
            Some(m) => &rest[..m.start()],
            None => rest,
        };
        let unique = unique_regex().is_match(before_comment);

        let spec = restore_directions(&name, &fields, comment.as_deref());

        Some(IndexInfo { name, spec, unique })
    }

    /// Map an error returned by an executed statement to a [`StoreError`]
    ///
    /// The statement reached the engine, so the result is never a
    /// connection error whatever the message says.
    pub fn classify_error(&self, table: &str, name: &str, message: &str) -> StoreError {
        let lower = message.to_lowercase();
        if lower.contains("already exists") {
            StoreError::conflict(table, name, message)
        } else if lower.contains("does not exist") || lower.contains("not found") {
            StoreError::not_found(table, name)
        } else {
            StoreError::operation(format!(
                "Index '{}' on table '{}': {}",
                name, table, message
            ))
        }
    }

    /// Map an error from sending a query to a [`StoreError`]
    ///
    /// Parse rejections come back through the same path but mean the engine
    /// was reached; everything else is a transport failure.
    pub fn classify_query_error(&self, table: &str, name: &str, message: &str) -> StoreError {
        let lower = message.to_lowercase();
        if lower.contains("parse error")
            || lower.contains("failed to parse")
            || lower.contains("invalid query")
            || lower.contains("unexpected token")
        {
            StoreError::operation(format!(
                "Index '{}' on table '{}': {}",
                name, table, message
            ))
        } else {
            StoreError::connection(message)
        }
    }

    /// Validate table (collection) name
    ///
    /// Table names must be non-empty and contain only alphanumeric
    /// characters and underscores.
    fn validate_table_name(table: &str) -> Result<(), StoreError> {
        if table.is_empty() || !table.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(StoreError::operation(format!(
                "Invalid collection name '{}': must contain only alphanumeric characters and underscores",
                table
            )));
        }
        Ok(())
    }
}

/// Rebuild the key sequence from `FIELDS` plus the key-pattern comment
fn restore_directions(name: &str, fields: &[String], comment: Option<&str>) -> IndexSpec {
    let ascending = || IndexSpec::new(fields.iter().map(IndexKey::ascending).collect());

    let Some(pattern) = comment.and_then(|c| c.trim().strip_prefix(KEY_PATTERN_PREFIX)) else {
        return ascending();
    };

    match IndexSpec::parse_key_pattern(pattern) {
        Ok(spec) if spec.fields().eq(fields.iter().map(String::as_str)) => spec,
        Ok(_) | Err(_) => {
            tracing::warn!(
                "Key pattern comment on index '{}' does not match its fields; assuming ascending",
                name
            );
            ascending()
        }
    }
}

fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier with backticks unless it is a plain identifier
pub fn quote_ident(s: &str) -> String {
    if is_plain_ident(s) {
        s.to_string()
    } else {
        format!("`{}`", s.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Strip backtick or angle-bracket quoting from an identifier
pub fn unquote_ident(s: &str) -> String {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('`').and_then(|r| r.strip_suffix('`')) {
        return inner.replace("\\`", "`").replace("\\\\", "\\");
    }
    if let Some(inner) = s.strip_prefix('⟨').and_then(|r| r.strip_suffix('⟩')) {
        return inner.to_string();
    }
    s.to_string()
}

fn quote_field_path(path: &str) -> String {
    path.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

fn unquote_field_path(path: &str) -> String {
    split_outside_quotes(path, '.')
        .iter()
        .map(|segment| unquote_ident(segment))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_fields(fields: &str) -> Vec<String> {
    split_outside_quotes(fields, ',')
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Split on `sep` while ignoring separators inside backtick or `⟨⟩` quotes
fn split_outside_quotes(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_backtick = false;
    let mut in_angle = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_backtick => {
                current.push(c);
                escaped = true;
            }
            '`' if !in_angle => {
                in_backtick = !in_backtick;
                current.push(c);
            }
            '⟨' if !in_backtick => {
                in_angle = true;
                current.push(c);
            }
            '⟩' if !in_backtick => {
                in_angle = false;
                current.push(c);
            }
            c if c == sep && !in_backtick && !in_angle => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}
