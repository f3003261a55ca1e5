//! Example consumer: a products API built on crudkit.
//!
//! Serve: `cargo run -p example-consumer`
//! Create the schema from `config.sql`: `cargo run -p example-consumer -- setup`

use crudkit::{App, AppError, CrudPattern, PatternSet, RequestContext, ValidationRule};
use serde_json::json;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudkit=info,example_consumer=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "exiting");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let mut app = App::from_file(None).await?;

    app.error(|ctx: RequestContext| async move {
        if let Some(e) = ctx.error() {
            tracing::warn!(path = %ctx.path, error = %e, "request failed");
        }
        Ok::<_, AppError>("the error is thrown")
    });

    app.get("/api/products", |ctx: RequestContext| async move {
        ctx.state().cache()?.set("foo", "bar").await?;
        ctx.state().store()?.query("SELECT * FROM products", &[]).await
    });

    app.post("/api/products", |ctx: RequestContext| async move { Ok::<_, AppError>(ctx.data()) });

    app.get("/api/status", |ctx: RequestContext| async move {
        Ok::<_, AppError>(json!({ "routes": "ok", "port": ctx.state().config.port }))
    });

    app.crud(
        "/api/catalog",
        PatternSet::all(
            CrudPattern::new("products")
                .columns(["id", "name", "price"])
                .creatable(["name", "price"])
                .updatable(["name", "price"])
                .filters(["name", "price"])
                .cast("price", "numeric")
                .rule("name", ValidationRule::required()),
        ),
    );

    app.run().await
}
