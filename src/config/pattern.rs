//! Declarative CRUD patterns: which table, which columns, which filters.

use crate::config::ValidationRule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const DEFAULT_MAX_LIMIT: u32 = 100;

/// One allowed operation against a table. Identifiers here are the only ones
/// that ever reach generated SQL; request values are always bound.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrudPattern {
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Columns returned by reads and by `RETURNING`. Empty means `*`.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub creatable: Vec<String>,
    #[serde(default)]
    pub updatable: Vec<String>,
    /// Fields that may narrow a list by exact match.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Default page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    /// PostgreSQL type per column, used as `$n::type` so text values bind correctly.
    #[serde(default)]
    pub casts: HashMap<String, String>,
    /// Body rules applied to create (fully) and update (present fields only).
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

impl CrudPattern {
    pub fn new(table: impl Into<String>) -> Self {
        CrudPattern {
            table: table.into(),
            primary_key: default_primary_key(),
            columns: Vec::new(),
            creatable: Vec::new(),
            updatable: Vec::new(),
            filters: Vec::new(),
            limit: DEFAULT_PAGE_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            casts: HashMap::new(),
            validation: HashMap::new(),
        }
    }

    pub fn primary_key(mut self, pk: impl Into<String>) -> Self {
        self.primary_key = pk.into();
        self
    }

    pub fn columns<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn creatable<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.creatable = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn updatable<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updatable = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn filters<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn max_limit(mut self, max_limit: u32) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn cast(mut self, column: impl Into<String>, pg_type: impl Into<String>) -> Self {
        self.casts.insert(column.into(), pg_type.into());
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.validation.insert(field.into(), rule);
        self
    }
}

/// Patterns for the four generated endpoints of one `crud` registration.
/// A missing pattern means that endpoint is not registered.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PatternSet {
    #[serde(default)]
    pub query: Option<CrudPattern>,
    #[serde(default)]
    pub create: Option<CrudPattern>,
    #[serde(default)]
    pub update: Option<CrudPattern>,
    #[serde(default)]
    pub delete: Option<CrudPattern>,
}

impl PatternSet {
    /// Same pattern for every operation.
    pub fn all(pattern: CrudPattern) -> Self {
        PatternSet {
            query: Some(pattern.clone()),
            create: Some(pattern.clone()),
            update: Some(pattern.clone()),
            delete: Some(pattern),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CrudPattern)> {
        [
            ("query", self.query.as_ref()),
            ("create", self.create.as_ref()),
            ("update", self.update.as_ref()),
            ("delete", self.delete.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, p)| p.map(|p| (kind, p)))
    }
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_max_limit() -> u32 {
    DEFAULT_MAX_LIMIT
}
