//! Typed application config, loadable from a JSON file or an in-memory value.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SQL_FILE: &str = "./database.sql";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Status used when a handler times out (504 Gateway Timeout).
pub const DEFAULT_TIMEOUT_STATUS: u16 = 504;
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// SQL file executed by the `setup` command.
    #[serde(default = "default_sql_file")]
    pub sql: String,
    /// Optional JSON file of named pattern sets.
    #[serde(default)]
    pub patterns: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_timeout_status")]
    pub timeout_status: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: DEFAULT_PORT,
            database: None,
            redis: None,
            sql: DEFAULT_SQL_FILE.into(),
            patterns: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_status: DEFAULT_TIMEOUT_STATUS,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Per-field body rule. A map of these keyed by field name forms a [`crate::Schema`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ValidationRule {
    pub fn required() -> Self {
        ValidationRule {
            required: Some(true),
            ..Default::default()
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sql_file() -> String {
    DEFAULT_SQL_FILE.into()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_timeout_status() -> u16 {
    DEFAULT_TIMEOUT_STATUS
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

fn default_max_connections() -> u32 {
    5
}
