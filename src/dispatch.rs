//! Per-request control flow: match, handle, fall back to the error handler,
//! and finally to a fixed response that cannot fail.

use crate::context::{IncomingRequest, RequestContext};
use crate::error::AppError;
use crate::handler::WrappedHandler;
use crate::response::Response;
use crate::router::Router;
use crate::state::AppState;
use serde_json::Map;

/// Not-found handler used when none is registered: fails, so the error handler renders the 404.
pub(crate) async fn default_not_found(ctx: RequestContext) -> Result<(), AppError> {
    Err(AppError::NotFound(format!("{} {}", ctx.method, ctx.path)))
}

/// Error handler used when none is registered: `{"error": {"code", "message"}}`.
pub(crate) async fn default_error(ctx: RequestContext) -> Result<crate::error::ErrorBody, AppError> {
    let body = match ctx.error() {
        Some(e) => e.to_body(),
        None => AppError::Unhandled("unknown failure".into()).to_body(),
    };
    Ok(body)
}

pub struct Dispatcher {
    router: Router,
    not_found: WrappedHandler,
    error: WrappedHandler,
    state: AppState,
}

impl Dispatcher {
    pub fn new(router: Router, not_found: WrappedHandler, error: WrappedHandler, state: AppState) -> Self {
        Dispatcher {
            router,
            not_found,
            error,
            state,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Produce exactly one response for `req`. Never fails.
    pub async fn dispatch(&self, req: IncomingRequest) -> Response {
        let (handler, params) = match self.router.lookup(&req.method, req.path()) {
            Some(found) => found,
            None => (&self.not_found, Map::new()),
        };
        match handler.invoke(&req, params.clone(), None, &self.state).await {
            Ok(resp) => resp,
            Err(err) => self.handle_error(&req, params, err).await,
        }
    }

    /// Enter the chain at the error handler, e.g. when the body could not be read.
    pub async fn fail(&self, req: IncomingRequest, err: AppError) -> Response {
        self.handle_error(&req, Map::new(), err).await
    }

    async fn handle_error(&self, req: &IncomingRequest, params: Map<String, serde_json::Value>, err: AppError) -> Response {
        if err.status().is_server_error() {
            tracing::warn!(method = %req.method, path = %req.path(), error = %err, "request failed");
        } else {
            tracing::debug!(method = %req.method, path = %req.path(), error = %err, "request rejected");
        }
        match self.error.invoke(req, params, Some(err), &self.state).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(method = %req.method, path = %req.path(), error = %e, "error handler failed");
                Response::fallback()
            }
        }
    }
}
