//! crudkit: route dispatch and declarative CRUD endpoints for JSON APIs over PostgreSQL.
//!
//! ```rust,no_run
//! use crudkit::{App, AppError, CrudPattern, PatternSet, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let mut app = App::from_file(None).await?;
//!     app.get("/api/hello/<name:string>", |ctx: RequestContext| async move {
//!         Ok::<_, AppError>(serde_json::json!({ "hello": ctx.param("name") }))
//!     });
//!     app.crud(
//!         "/api/products",
//!         PatternSet::all(CrudPattern::new("products").creatable(["name"]).filters(["name"])),
//!     );
//!     app.run().await
//! }
//! ```

pub mod app;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod pagination;
pub mod response;
pub mod router;
pub mod server;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use app::App;
pub use cache::{Cache, RedisCache};
pub use config::{load_patterns, AppConfig, CrudPattern, PatternSet, ValidationRule};
pub use context::{IncomingRequest, RequestContext};
pub use dispatch::Dispatcher;
pub use error::{AppError, ConfigError};
pub use handler::Handler;
pub use pagination::{paginate, Pagination};
pub use response::Response;
pub use service::{CrudService, ListPage, Schema};
pub use state::AppState;
pub use store::{ExecResult, PgStore, Store};
