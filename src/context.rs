//! Inbound request and the per-request context handed to handlers.

use crate::error::AppError;
use crate::service::Schema;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A fully read request, detached from the HTTP connection.
#[derive(Clone, Debug)]
pub struct IncomingRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        IncomingRequest { method, uri, headers, body }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Query-string fields as JSON strings.
    pub fn query(&self) -> Result<Map<String, Value>, AppError> {
        if self.uri.query().is_none() {
            return Ok(Map::new());
        }
        let Query(pairs) = Query::<HashMap<String, String>>::try_from_uri(&self.uri)
            .map_err(|e| AppError::BadRequest(format!("query string: {}", e)))?;
        Ok(pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
    }
}

/// Parse a request body as a JSON object and check it against `schema`.
/// An empty body is an empty object; anything that is not an object fails validation.
pub fn parse_body(body: &[u8], schema: Option<&Schema>) -> Result<Map<String, Value>, AppError> {
    let map = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(m)) => m,
            Ok(_) => return Err(AppError::Validation("body must be a JSON object".into())),
            Err(e) => return Err(AppError::Validation(format!("malformed JSON body: {}", e))),
        }
    };
    if let Some(schema) = schema {
        schema.validate(&map)?;
    }
    Ok(map)
}

/// Best-effort body for the error handler: never fails, malformed input reads as `{}`.
pub fn parse_body_lenient(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    }
}

/// What a handler sees. `data()` merges query, body and path params; path params win, then body.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub body: Map<String, Value>,
    error: Option<AppError>,
    state: AppState,
}

impl RequestContext {
    pub fn new(
        req: &IncomingRequest,
        query: Map<String, Value>,
        params: Map<String, Value>,
        body: Map<String, Value>,
        error: Option<AppError>,
        state: AppState,
    ) -> Self {
        RequestContext {
            method: req.method.clone(),
            path: req.path().to_string(),
            headers: req.headers.clone(),
            query,
            params,
            body,
            error,
            state,
        }
    }

    pub fn data(&self) -> Map<String, Value> {
        let mut data = self.query.clone();
        data.extend(self.payload());
        data
    }

    /// Body merged with path params (params win), without query-string fields.
    /// Writes compile from this so a query string can never set a column.
    pub fn payload(&self) -> Map<String, Value> {
        let mut data = self.body.clone();
        data.extend(self.params.clone());
        data
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Failure that routed this request to the error handler.
    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ValidationRule};
    use serde_json::json;

    fn request(uri: &str, body: &'static str) -> IncomingRequest {
        IncomingRequest::new(Method::POST, uri.parse().unwrap(), HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn params_override_body_override_query() {
        let req = request("/items/7?id=1&q=x&name=fromquery", "");
        let ctx = RequestContext::new(
            &req,
            req.query().unwrap(),
            obj(json!({ "id": 7 })),
            obj(json!({ "id": 99, "name": "lamp" })),
            None,
            AppState::new(AppConfig::default()),
        );
        let data = ctx.data();
        assert_eq!(data["id"], json!(7));
        assert_eq!(data["name"], json!("lamp"));
        assert_eq!(data["q"], json!("x"));
        let payload = ctx.payload();
        assert_eq!(payload["id"], json!(7));
        assert!(!payload.contains_key("q"));
    }

    #[test]
    fn query_is_decoded() {
        let q = request("/s?name=a%20b&page=2", "").query().unwrap();
        assert_eq!(q["name"], json!("a b"));
        assert_eq!(q["page"], json!("2"));
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert!(parse_body(b"", None).unwrap().is_empty());
        assert!(parse_body(b"  \n", None).unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_validation_error() {
        assert!(matches!(parse_body(b"[1,2]", None), Err(AppError::Validation(_))));
        assert!(matches!(parse_body(b"{oops", None), Err(AppError::Validation(_))));
    }

    #[test]
    fn schema_failure_is_not_dropped() {
        let schema = Schema::new().field("name", ValidationRule::required());
        assert!(matches!(parse_body(br#"{"price":1}"#, Some(&schema)), Err(AppError::Validation(_))));
        assert!(parse_body(br#"{"name":"x"}"#, Some(&schema)).is_ok());
    }

    #[test]
    fn lenient_body_never_fails() {
        assert!(parse_body_lenient(b"{oops").is_empty());
        assert_eq!(parse_body_lenient(br#"{"a":1}"#)["a"], json!(1));
    }
}
