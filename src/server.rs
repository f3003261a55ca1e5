//! HTTP serving: axum hands every request to the dispatcher.

use crate::context::IncomingRequest;
use crate::dispatch::Dispatcher;
use crate::error::AppError;
use crate::response::Response;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::Router;
use http_body_util::LengthLimitError;
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct Serving {
    dispatcher: Arc<Dispatcher>,
    body_limit: usize,
}

/// Axum app whose only service is the dispatcher. Bodies over `body_limit` bytes
/// enter the error chain as `PayloadTooLarge`.
pub fn router(dispatcher: Arc<Dispatcher>, body_limit: usize) -> Router {
    Router::new()
        .fallback(handle)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(Serving { dispatcher, body_limit })
}

async fn handle(State(serving): State<Serving>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    match axum::body::to_bytes(body, serving.body_limit).await {
        Ok(bytes) => {
            serving
                .dispatcher
                .dispatch(IncomingRequest::new(parts.method, parts.uri, parts.headers, bytes))
                .await
        }
        Err(e) => {
            let err = if exceeds_limit(&e) {
                AppError::PayloadTooLarge(serving.body_limit)
            } else {
                AppError::BadRequest(format!("reading body: {}", e))
            };
            let req = IncomingRequest::new(parts.method, parts.uri, parts.headers, Bytes::new());
            serving.dispatcher.fail(req, err).await
        }
    }
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Serve on `0.0.0.0:port` until Ctrl-C.
pub async fn serve(dispatcher: Arc<Dispatcher>, port: u16, body_limit: usize) -> Result<(), AppError> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(crate::error::ConfigError::Io)?;
    let addr = listener.local_addr().map_err(crate::error::ConfigError::Io)?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, router(dispatcher, body_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(crate::error::ConfigError::Io)?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
