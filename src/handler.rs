//! Handler trait, type erasure, and the wrapper that every handler runs inside.
//!
//! Route handlers, the not-found handler and the error handler are all plain
//! async functions of one shape:
//!
//! ```text
//! async fn name(ctx: RequestContext) -> Result<impl Serialize, AppError>
//! ```
//!
//! Registration erases the concrete type into a [`BoxedHandler`] and wraps it
//! in a [`WrappedHandler`], which owns body parsing/validation, the timeout
//! and JSON encoding. Which of the three roles a handler plays only changes
//! the success status and how strictly the body is parsed.

use crate::context::{parse_body, parse_body_lenient, IncomingRequest, RequestContext};
use crate::error::AppError;
use crate::response::Response;
use crate::service::Schema;
use crate::state::AppState;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<Value, AppError>>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

/// Implemented for every `Fn(RequestContext) -> impl Future<Output = Result<T, AppError>>`
/// where `T: Serialize`. Sealed: the blanket impl is the only one.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, T> private::Sealed for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
}

impl<F, Fut, T> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, T> ErasedHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<Result<Value, AppError>> {
        let fut = (self.0)(ctx);
        Box::pin(async move {
            let out = fut.await?;
            Ok(serde_json::to_value(out)?)
        })
    }
}

/// Role of a wrapped handler in the dispatch chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Route,
    NotFound,
    Error,
}

/// Runtime limits shared by every wrapped handler.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutPolicy {
    pub duration: Duration,
    pub status: StatusCode,
}

impl TimeoutPolicy {
    pub fn new(duration: Duration, status: StatusCode) -> Self {
        TimeoutPolicy { duration, status }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        TimeoutPolicy {
            duration: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            status: StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// A handler plus its schema, timeout and role.
#[derive(Clone)]
pub struct WrappedHandler {
    inner: BoxedHandler,
    schema: Option<Arc<Schema>>,
    timeout: TimeoutPolicy,
    kind: HandlerKind,
}

impl WrappedHandler {
    pub fn new(handler: impl Handler, schema: Option<Schema>, timeout: TimeoutPolicy, kind: HandlerKind) -> Self {
        WrappedHandler {
            inner: handler.into_boxed_handler(),
            schema: schema.filter(|s| !s.is_empty()).map(Arc::new),
            timeout,
            kind,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Parse and validate the body, build the context, run the handler under the
    /// timeout and encode its result as JSON.
    ///
    /// The handler runs as its own task. On timeout that task is aborted, so its
    /// result can never reach a response and its in-flight I/O is dropped.
    pub async fn invoke(
        &self,
        req: &IncomingRequest,
        params: Map<String, Value>,
        error: Option<AppError>,
        state: &AppState,
    ) -> Result<Response, AppError> {
        let (query, body) = match self.kind {
            HandlerKind::Error => (req.query().unwrap_or_default(), parse_body_lenient(&req.body)),
            _ => (req.query()?, parse_body(&req.body, self.schema.as_deref())?),
        };
        let status = match (self.kind, &error) {
            (HandlerKind::Route, _) => StatusCode::OK,
            (HandlerKind::NotFound, _) => StatusCode::NOT_FOUND,
            (HandlerKind::Error, Some(e)) => e.status(),
            (HandlerKind::Error, None) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let ctx = RequestContext::new(req, query, params, body, error, state.clone());

        let mut task = tokio::spawn(self.inner.call(ctx));
        let value = match tokio::time::timeout(self.timeout.duration, &mut task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => {
                return Err(AppError::Unhandled(format!("handler task failed: {}", join_err)));
            }
            Err(_) => {
                task.abort();
                return Err(AppError::Timeout {
                    elapsed_ms: self.timeout.duration.as_millis() as u64,
                    status: self.timeout.status,
                });
            }
        };
        let text = serde_json::to_string(&value)?;
        Ok(Response::json(status, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ValidationRule};
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn request(body: &'static str) -> IncomingRequest {
        IncomingRequest::new(
            Method::POST,
            "/things/3".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    fn state() -> AppState {
        AppState::new(AppConfig::default())
    }

    fn wrap(handler: impl Handler, schema: Option<Schema>, kind: HandlerKind) -> WrappedHandler {
        WrappedHandler::new(handler, schema, TimeoutPolicy::new(Duration::from_millis(100), StatusCode::GATEWAY_TIMEOUT), kind)
    }

    async fn echo(ctx: RequestContext) -> Result<Map<String, Value>, AppError> {
        Ok(ctx.data())
    }

    #[tokio::test]
    async fn encodes_json_with_merged_data() {
        let h = wrap(echo, None, HandlerKind::Route);
        let params = json!({ "id": 3 }).as_object().cloned().unwrap();
        let resp = h.invoke(&request(r#"{"id": 9, "name": "x"}"#), params, None, &state()).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.content_type(), Some("application/json"));
        let v: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(v, json!({ "id": 3, "name": "x" }));
    }

    #[tokio::test]
    async fn schema_failure_stops_before_handler() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let h = wrap(
            move |_ctx: RequestContext| {
                let flag = flag.clone();
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok::<_, AppError>(json!({}))
                }
            },
            Some(Schema::new().field("name", ValidationRule::required())),
            HandlerKind::Route,
        );
        let err = h.invoke(&request("{}"), Map::new(), None, &state()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_aborts_late_handler() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let h = wrap(
            move |_ctx: RequestContext| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok::<_, AppError>("late")
                }
            },
            None,
            HandlerKind::Route,
        );
        let err = h.invoke(&request(""), Map::new(), None, &state()).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout { status: StatusCode::GATEWAY_TIMEOUT, .. }));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_handler_is_unhandled_error() {
        let h = wrap(
            |_ctx: RequestContext| async move {
                if true {
                    panic!("boom");
                }
                Ok::<_, AppError>(())
            },
            None,
            HandlerKind::Route,
        );
        let err = h.invoke(&request(""), Map::new(), None, &state()).await.unwrap_err();
        assert!(matches!(err, AppError::Unhandled(_)));
    }

    #[tokio::test]
    async fn error_kind_uses_error_status_and_ignores_bad_body() {
        let h = wrap(
            |ctx: RequestContext| async move {
                Ok::<_, AppError>(json!({ "message": ctx.error().map(|e| e.to_string()) }))
            },
            None,
            HandlerKind::Error,
        );
        let err = AppError::NotFound("/x".into());
        let resp = h.invoke(&request("{broken"), Map::new(), Some(err), &state()).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body, r#"{"message":"not found: /x"}"#);
    }

    #[tokio::test]
    async fn not_found_kind_answers_404() {
        let h = wrap(|_ctx: RequestContext| async move { Ok::<_, AppError>("nothing here") }, None, HandlerKind::NotFound);
        let resp = h.invoke(&request(""), Map::new(), None, &state()).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.body, r#""nothing here""#);
    }
}
