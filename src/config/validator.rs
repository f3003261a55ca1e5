//! Config validation: limits, identifiers and cast types that end up in SQL text.

use crate::config::{AppConfig, CrudPattern, PatternSet};
use crate::error::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn pg_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?(\[\])?$").expect("static regex")
    })
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation("timeout_ms must be positive".into()));
    }
    if axum::http::StatusCode::from_u16(config.timeout_status).is_err() {
        return Err(ConfigError::Validation(format!(
            "timeout_status {} is not an HTTP status",
            config.timeout_status
        )));
    }
    if let Some(db) = &config.database {
        if db.url.is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".into()));
        }
    }
    Ok(())
}

pub fn validate_patterns(set: &PatternSet) -> Result<(), ConfigError> {
    for (kind, pattern) in set.iter() {
        validate_pattern(pattern).map_err(|e| ConfigError::Validation(format!("{} pattern: {}", kind, e)))?;
    }
    Ok(())
}

pub fn validate_pattern(p: &CrudPattern) -> Result<(), ConfigError> {
    // Table may be schema-qualified.
    if p.table.is_empty() || !p.table.split('.').all(|part| identifier_re().is_match(part)) {
        return Err(ConfigError::Validation(format!("invalid table name '{}'", p.table)));
    }
    let names = std::iter::once(&p.primary_key)
        .chain(&p.columns)
        .chain(&p.creatable)
        .chain(&p.updatable)
        .chain(&p.filters)
        .chain(p.casts.keys());
    for name in names {
        if !identifier_re().is_match(name) {
            return Err(ConfigError::Validation(format!("invalid column name '{}'", name)));
        }
    }
    for ty in p.casts.values() {
        if !pg_type_re().is_match(ty) {
            return Err(ConfigError::Validation(format!("invalid cast type '{}'", ty)));
        }
    }
    if p.limit == 0 {
        return Err(ConfigError::Validation("limit must be positive".into()));
    }
    if p.limit > p.max_limit {
        return Err(ConfigError::Validation(format!(
            "limit {} exceeds max_limit {}",
            p.limit, p.max_limit
        )));
    }
    Ok(())
}
