//! Outbound response: status, headers and an already encoded body.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;

pub const FALLBACK_BODY: &str = "Internal Server Error";

#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    /// JSON response from already encoded text.
    pub fn json(status: StatusCode, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Response { status, headers, body }
    }

    /// Last-resort response when the error handler itself failed. Cannot fail.
    pub fn fallback() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Response {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers,
            body: FALLBACK_BODY.to_string(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type() {
        let r = Response::json(StatusCode::OK, "{}".into());
        assert_eq!(r.content_type(), Some("application/json"));
    }

    #[test]
    fn fallback_is_plain_500() {
        let r = Response::fallback();
        assert_eq!(r.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(r.content_type(), Some("text/plain"));
        assert_eq!(r.body, FALLBACK_BODY);
    }

    #[test]
    fn converts_into_axum_response() {
        let r = Response::json(StatusCode::CREATED, "{}".into()).into_response();
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(r.headers()[header::CONTENT_TYPE], "application/json");
    }
}
