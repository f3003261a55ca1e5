//! Shared application state handed to every handler. Built once at startup, read-only afterwards.

use crate::cache::Cache;
use crate::config::{AppConfig, PatternSet};
use crate::error::{AppError, ConfigError};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Option<Arc<dyn Store>>,
    pub cache: Option<Arc<dyn Cache>>,
    /// Named pattern sets loaded from `config.patterns`.
    pub patterns: Arc<HashMap<String, PatternSet>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        AppState {
            config: Arc::new(config),
            store: None,
            cache: None,
            patterns: Arc::new(HashMap::new()),
        }
    }

    pub fn with_store(mut self, store: impl Store) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_cache(mut self, cache: impl Cache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_patterns(mut self, patterns: HashMap<String, PatternSet>) -> Self {
        self.patterns = Arc::new(patterns);
        self
    }

    pub fn store(&self) -> Result<&Arc<dyn Store>, AppError> {
        self.store
            .as_ref()
            .ok_or_else(|| ConfigError::Validation("no database configured".into()).into())
    }

    pub fn cache(&self) -> Result<&Arc<dyn Cache>, AppError> {
        self.cache
            .as_ref()
            .ok_or_else(|| ConfigError::Validation("no redis configured".into()).into())
    }
}
