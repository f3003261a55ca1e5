//! Load config from a JSON file or an in-memory value, then apply environment overrides.

use crate::config::{validate_config, validate_patterns, AppConfig, DatabaseConfig, PatternSet, RedisConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "./config.json";

impl AppConfig {
    /// Read and validate a JSON config file. Environment overrides are applied after parsing.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        Self::from_value(value)
    }

    /// Build from an in-memory JSON value. Missing keys take their defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let mut config: AppConfig = serde_json::from_value(value)?;
        config.apply_env();
        validate_config(&config)?;
        Ok(config)
    }

    /// `PORT`, `DATABASE_URL` and `REDIS_URL` (also read from `.env`) win over file values.
    pub fn apply_env(&mut self) {
        dotenvy::dotenv().ok();
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            match self.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.database = Some(DatabaseConfig {
                        url,
                        max_connections: 5,
                    })
                }
            }
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis = Some(RedisConfig { url });
        }
    }
}

/// Load named pattern sets from a JSON file: `{ "products": { "query": {...}, ... } }`.
pub async fn load_patterns(path: impl AsRef<Path>) -> Result<HashMap<String, PatternSet>, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let sets: HashMap<String, PatternSet> = serde_json::from_str(&raw)?;
    for (name, set) in &sets {
        validate_patterns(set).map_err(|e| ConfigError::Validation(format!("{}: {}", name, e)))?;
    }
    tracing::debug!(count = sets.len(), file = %path.display(), "loaded pattern sets");
    Ok(sets)
}
