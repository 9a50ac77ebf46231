//! Response values and their framing.
//!
//! # Responsibilities
//! - Build responses from handlers and from mapped errors
//! - Turn a response into exactly one start frame and one body frame
//!
//! # Design Decisions
//! - Responses are values; builder methods consume `self`
//! - `204`, an empty body, or a JSON `null` body frame as bodyless
//! - `content-type: application/json` is added when none was set

use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::protocol::OutboundEvent;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl Response {
    /// A bodyless response.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A JSON response.
    pub fn json(status: StatusCode, data: &Value) -> Self {
        Self::new(status)
            .with_header("content-type", JSON_CONTENT_TYPE)
            .with_body(data.to_string())
    }

    /// `200 OK` with a JSON body.
    pub fn ok(data: Value) -> Self {
        Self::json(StatusCode::OK, &data)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(text.into())
    }

    /// Generic error frame: `{"detail": "<reason phrase>"}`.
    pub fn exception(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        Self::json(status, &json!({ "detail": reason }))
    }

    /// Set a header, replacing any existing value (case-insensitive).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Start and body frames for the host.
    pub fn into_frames(self) -> (OutboundEvent, OutboundEvent) {
        let bodyless = self.status == StatusCode::NO_CONTENT;
        let body = self
            .body
            .filter(|body| !bodyless && !body.is_empty() && &body[..] != b"null");

        let mut headers = self.headers;
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            headers.push(("content-type".to_owned(), JSON_CONTENT_TYPE.to_owned()));
        }

        (
            OutboundEvent::HttpResponseStart {
                status: self.status.as_u16(),
                headers,
            },
            OutboundEvent::HttpResponseBody { body },
        )
    }
}

impl From<ApiError> for Response {
    fn from(error: ApiError) -> Self {
        Self::json(error.status, &error.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(frame: OutboundEvent) -> Option<Bytes> {
        match frame {
            OutboundEvent::HttpResponseBody { body } => body,
            other => panic!("expected body frame, got {other:?}"),
        }
    }

    #[test]
    fn test_no_content_drops_body() {
        let response = Response::ok(json!({ "ignored": true })).with_status(StatusCode::NO_CONTENT);
        let (start, body) = response.into_frames();

        assert!(matches!(start, OutboundEvent::HttpResponseStart { status: 204, .. }));
        assert_eq!(body_of(body), None);
    }

    #[test]
    fn test_null_json_is_bodyless() {
        let (_, body) = Response::ok(Value::Null).into_frames();
        assert_eq!(body_of(body), None);
    }

    #[test]
    fn test_default_content_type_is_added() {
        let (start, body) = Response::new(StatusCode::ACCEPTED).with_body("x").into_frames();
        match start {
            OutboundEvent::HttpResponseStart { status, headers } => {
                assert_eq!(status, 202);
                assert_eq!(
                    headers,
                    vec![("content-type".to_owned(), "application/json".to_owned())]
                );
            }
            other => panic!("expected start frame, got {other:?}"),
        }
        assert_eq!(body_of(body), Some(Bytes::from_static(b"x")));
    }

    #[test]
    fn test_with_header_replaces_existing() {
        let response = Response::text(StatusCode::OK, "hi").with_header("Content-Type", "text/html");
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.header("content-type"), Some("text/html"));
    }

    #[test]
    fn test_exception_body_uses_reason_phrase() {
        let response = Response::exception(StatusCode::NOT_FOUND);
        assert_eq!(
            response.body().map(|b| &b[..]),
            Some(br#"{"detail":"Not Found"}"#.as_slice())
        );
    }

    #[test]
    fn test_api_error_mapping() {
        let response = Response::from(ApiError::forbidden("nope"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.body().map(|b| &b[..]),
            Some(br#"{"detail":"nope"}"#.as_slice())
        );
    }
}
