//! Per-method route tables. Built once at startup, read-only while serving.

use crate::handler::WrappedHandler;
use crate::router::path::PathTemplate;
use axum::http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct Route {
    pub method: Method,
    pub template: PathTemplate,
    pub handler: WrappedHandler,
}

/// Routes in registration order per method. The first route that matches wins;
/// there is no specificity ranking.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, template: PathTemplate, handler: WrappedHandler) {
        tracing::debug!(%method, path = %template, "route registered");
        self.routes.entry(method.clone()).or_default().push(Route {
            method,
            template,
            handler,
        });
    }

    pub fn lookup(&self, method: &Method, path: &str) -> Option<(&WrappedHandler, Map<String, Value>)> {
        self.routes
            .get(method)?
            .iter()
            .find_map(|route| route.template.matches(path).map(|params| (&route.handler, params)))
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::context::{IncomingRequest, RequestContext};
    use crate::error::AppError;
    use crate::handler::{HandlerKind, TimeoutPolicy};
    use crate::state::AppState;
    use axum::body::Bytes;
    use axum::http::HeaderMap;
    use serde_json::json;

    fn named(name: &'static str) -> WrappedHandler {
        WrappedHandler::new(
            move |_ctx: RequestContext| async move { Ok::<_, AppError>(name) },
            None,
            TimeoutPolicy::default(),
            HandlerKind::Route,
        )
    }

    async fn call(router: &Router, method: Method, path: &str) -> Option<String> {
        let (handler, params) = router.lookup(&method, path)?;
        let req = IncomingRequest::new(method, path.parse().unwrap(), HeaderMap::new(), Bytes::new());
        let resp = handler
            .invoke(&req, params, None, &AppState::new(AppConfig::default()))
            .await
            .unwrap();
        Some(resp.body)
    }

    fn router() -> Router {
        let mut r = Router::new();
        r.register(Method::GET, PathTemplate::parse("/items/<id:number>").unwrap(), named("by_id"));
        r.register(Method::GET, PathTemplate::parse("/items/<slug:string>").unwrap(), named("by_slug"));
        r.register(Method::GET, PathTemplate::parse("/items/new").unwrap(), named("new"));
        r.register(Method::POST, PathTemplate::parse("/items").unwrap(), named("create"));
        r
    }

    #[test]
    fn extracts_typed_params() {
        let r = router();
        let (_, params) = r.lookup(&Method::GET, "/items/12").unwrap();
        assert_eq!(params["id"], json!(12));
    }

    #[tokio::test]
    async fn first_registered_match_wins() {
        let r = router();
        assert_eq!(call(&r, Method::GET, "/items/12").await.as_deref(), Some(r#""by_id""#));
        // "new" is a valid string capture, so the earlier slug route shadows the literal.
        assert_eq!(call(&r, Method::GET, "/items/new").await.as_deref(), Some(r#""by_slug""#));
    }

    #[test]
    fn method_must_match_exactly() {
        let r = router();
        assert!(r.lookup(&Method::POST, "/items/12").is_none());
        assert!(r.lookup(&Method::PUT, "/items").is_none());
        assert!(r.lookup(&Method::POST, "/items").is_some());
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn unknown_path_has_no_match() {
        assert!(router().lookup(&Method::GET, "/other").is_none());
    }
}
