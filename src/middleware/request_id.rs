//! Request ID middleware.
//!
//! Reuses an incoming `x-request-id` header when present, otherwise
//! generates a UUID v4, and stores it in the connection's extensions so
//! handlers and logs can correlate on it.

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::duplex::DuplexConnection;
use crate::error::ApiError;
use crate::http::Request;
use crate::middleware::Middleware;

pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if !value.is_empty() => Self(value.to_owned()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    async fn before(&self, mut request: Request) -> Result<Request, ApiError> {
        let id = RequestId::from_header(request.header(X_REQUEST_ID));
        tracing::debug!(request_id = %id, path = request.path(), "Request ID assigned");
        request.extensions_mut().insert(id);
        Ok(request)
    }

    async fn before_duplex(&self, connection: &mut DuplexConnection) -> Result<(), ApiError> {
        let id = RequestId::from_header(connection.scope().header(X_REQUEST_ID));
        connection.extensions_mut().insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    use crate::protocol::Scope;

    #[tokio::test]
    async fn test_incoming_header_is_reused() {
        let request = Request::new(Scope::http(Method::GET, "/").with_header("X-Request-ID", "abc-123"));
        let request = RequestIdMiddleware.before(request).await.unwrap();

        assert_eq!(
            request.extensions().get::<RequestId>().map(RequestId::as_str),
            Some("abc-123")
        );
    }

    #[tokio::test]
    async fn test_missing_header_generates_uuid() {
        let request = Request::new(Scope::http(Method::GET, "/"));
        let request = RequestIdMiddleware.before(request).await.unwrap();

        let id = request.extensions().get::<RequestId>().unwrap();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }
}
