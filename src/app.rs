//! Registration API and process entry point.

use crate::bootstrap;
use crate::cache::RedisCache;
use crate::config::{load_patterns, validate_patterns, AppConfig, PatternSet, DEFAULT_CONFIG_FILE};
use crate::dispatch::{default_error, default_not_found, Dispatcher};
use crate::error::{AppError, ConfigError};
use crate::handler::{Handler, HandlerKind, TimeoutPolicy, WrappedHandler};
use crate::router::{PathTemplate, Router};
use crate::server;
use crate::service::{create_handler, delete_handler, list_handler, update_handler, Schema};
use crate::state::AppState;
use crate::store::PgStore;
use axum::http::{Method, StatusCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// First CLI arguments that run schema setup instead of serving.
pub const SETUP_COMMANDS: &[&str] = &["setup", "install", "init", "setupDatabase"];

/// Routes, handlers and shared state for one API. Register everything, then
/// [`run`](App::run) or turn it into a [`Dispatcher`].
pub struct App {
    router: Router,
    not_found: Option<WrappedHandler>,
    error: Option<WrappedHandler>,
    state: AppState,
    timeout: TimeoutPolicy,
}

impl App {
    /// Build clients from config: a lazily connecting PostgreSQL pool, a Redis client
    /// and the named pattern sets, each only when configured.
    pub async fn new(config: AppConfig) -> Result<Self, AppError> {
        let mut state = AppState::new(config.clone());
        if let Some(db) = &config.database {
            state = state.with_store(PgStore::connect_lazy(&db.url, db.max_connections)?);
        }
        if let Some(redis) = &config.redis {
            state = state.with_cache(RedisCache::open(&redis.url)?);
        }
        if let Some(file) = &config.patterns {
            state = state.with_patterns(load_patterns(file).await?);
        }
        Ok(Self::with_state(state))
    }

    /// Load config from a JSON file (default `./config.json`) and build the app.
    pub async fn from_file(path: Option<&Path>) -> Result<Self, AppError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config = AppConfig::from_file(path).await?;
        Self::new(config).await
    }

    /// Use prepared state, e.g. with a custom `Store`.
    pub fn with_state(state: AppState) -> Self {
        let timeout = TimeoutPolicy::new(
            Duration::from_millis(state.config.timeout_ms),
            StatusCode::from_u16(state.config.timeout_status).unwrap_or(StatusCode::GATEWAY_TIMEOUT),
        );
        App {
            router: Router::new(),
            not_found: None,
            error: None,
            state,
            timeout,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&[Method::GET], path, None, handler)
    }

    pub fn get_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&[Method::GET], path, Some(schema), handler)
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&[Method::POST], path, None, handler)
    }

    pub fn post_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&[Method::POST], path, Some(schema), handler)
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&[Method::PUT], path, None, handler)
    }

    pub fn put_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&[Method::PUT], path, Some(schema), handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&[Method::PATCH], path, None, handler)
    }

    pub fn patch_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&[Method::PATCH], path, Some(schema), handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&[Method::DELETE], path, None, handler)
    }

    pub fn delete_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&[Method::DELETE], path, Some(schema), handler)
    }

    /// GET, POST, PUT and DELETE.
    pub fn any(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.register(&ANY_METHODS, path, None, handler)
    }

    pub fn any_with(&mut self, path: &str, schema: Schema, handler: impl Handler) -> &mut Self {
        self.register(&ANY_METHODS, path, Some(schema), handler)
    }

    /// Handler for requests no route matches. Its result is sent with status 404.
    pub fn notfound(&mut self, handler: impl Handler) -> &mut Self {
        self.not_found = Some(WrappedHandler::new(handler, None, self.timeout, HandlerKind::NotFound));
        self
    }

    /// Handler for failed requests; the failure is in `ctx.error()` and sets the status.
    pub fn error(&mut self, handler: impl Handler) -> &mut Self {
        self.error = Some(WrappedHandler::new(handler, None, self.timeout, HandlerKind::Error));
        self
    }

    /// Register list (`GET path`), create (`POST path`), update (`PUT path/<id:number>`)
    /// and delete (`DELETE path/<id:number>`) for every pattern present in `set`.
    ///
    /// # Panics
    ///
    /// Panics if a pattern is invalid, like an invalid route template.
    pub fn crud(&mut self, path: &str, set: PatternSet) -> &mut Self {
        if let Err(e) = validate_patterns(&set) {
            panic!("invalid patterns for `{path}`: {e}");
        }
        let item_path = format!("{}/<id:number>", path.trim_end_matches('/'));
        if let Some(p) = set.query {
            self.register(&[Method::GET], path, None, list_handler(Arc::new(p)));
        }
        if let Some(p) = set.create {
            let schema = Schema::from_rules(p.validation.clone());
            self.register(&[Method::POST], path, Some(schema), create_handler(Arc::new(p)));
        }
        if let Some(p) = set.update {
            let schema = Schema::from_rules(p.validation.clone()).partial();
            self.register(&[Method::PUT], &item_path, Some(schema), update_handler(Arc::new(p)));
        }
        if let Some(p) = set.delete {
            self.register(&[Method::DELETE], &item_path, None, delete_handler(Arc::new(p)));
        }
        self
    }

    /// `crud` with a pattern set loaded from the configured patterns file.
    pub fn crud_from(&mut self, path: &str, name: &str) -> Result<&mut Self, AppError> {
        let set = self
            .state
            .patterns
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Validation(format!("no pattern set named '{}'", name)))?;
        Ok(self.crud(path, set))
    }

    fn register(&mut self, methods: &[Method], path: &str, schema: Option<Schema>, handler: impl Handler) -> &mut Self {
        let template = PathTemplate::parse(path).unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        let handler = WrappedHandler::new(handler, schema, self.timeout, HandlerKind::Route);
        for method in methods {
            self.router.register(method.clone(), template.clone(), handler.clone());
        }
        self
    }

    pub fn into_dispatcher(self) -> Dispatcher {
        let not_found = self
            .not_found
            .unwrap_or_else(|| WrappedHandler::new(default_not_found, None, self.timeout, HandlerKind::NotFound));
        let error = self
            .error
            .unwrap_or_else(|| WrappedHandler::new(default_error, None, self.timeout, HandlerKind::Error));
        Dispatcher::new(self.router, not_found, error, self.state)
    }

    /// Run schema setup when the first CLI argument is a setup command, otherwise serve HTTP.
    pub async fn run(self) -> Result<(), AppError> {
        let command = std::env::args().nth(1);
        self.run_command(command.as_deref()).await
    }

    pub async fn run_command(self, command: Option<&str>) -> Result<(), AppError> {
        match command {
            Some(cmd) if is_setup_command(cmd) => bootstrap::setup_database(&self.state).await,
            _ => {
                let port = self.state.config.port;
                let body_limit = self.state.config.body_limit;
                server::serve(Arc::new(self.into_dispatcher()), port, body_limit).await
            }
        }
    }
}

const ANY_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

pub fn is_setup_command(arg: &str) -> bool {
    SETUP_COMMANDS.contains(&arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_setup_commands() {
        for cmd in ["setup", "install", "init", "setupDatabase"] {
            assert!(is_setup_command(cmd));
        }
        assert!(!is_setup_command("serve"));
        assert!(!is_setup_command("SETUP"));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn invalid_template_panics_at_registration() {
        let mut app = App::with_state(AppState::new(AppConfig::default()));
        app.get("/x/<id:money>", |_ctx: crate::RequestContext| async move { Ok::<_, AppError>(()) });
    }

    #[test]
    fn crud_from_unknown_set_fails() {
        let mut app = App::with_state(AppState::new(AppConfig::default()));
        assert!(app.crud_from("/things", "things").is_err());
    }
}
