//! Error taxonomy for the dispatch core.
//!
//! # Kinds
//! - [`ApiError`]: raised on purpose by handlers and middleware, always
//!   converted to a response at the dispatch boundary
//! - [`HandlerError::Defect`]: anything else escaping a handler; framed as 500
//! - [`HostError`]: the host stopped listening, nothing more can be framed
//! - [`StartupError`]: bootstrap failures; fatal for the process

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::config::loader::ConfigError;
use crate::duplex::broker::BrokerError;
use crate::routing::RouteError;

/// Structured client-facing failure carrying a status and a detail payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<Value>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// An error whose detail is the status' reason phrase.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown Status"))
    }

    pub fn bad_request(detail: impl Into<Value>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<Value>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn forbidden(detail: impl Into<Value>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn not_found(detail: impl Into<Value>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn method_not_allowed() -> Self {
        Self::from_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// Response payload: the detail itself when it is already an object,
    /// otherwise `{"detail": <detail>}`.
    pub fn body(&self) -> Value {
        if self.detail.is_object() {
            self.detail.clone()
        } else {
            json!({ "detail": self.detail })
        }
    }
}

/// Error half of a handler's result.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Unexpected failure. Never shown to the client.
    #[error("unhandled defect: {0}")]
    Defect(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn defect(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Defect(error.into())
    }
}

/// The host side of a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("host disconnected")]
    Disconnected,
}

/// Failures while bootstrapping the process.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("route table error: {0}")]
    Routes(#[from] RouteError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_detail_is_wrapped() {
        let error = ApiError::bad_request("missing field");
        assert_eq!(error.body(), json!({ "detail": "missing field" }));
    }

    #[test]
    fn test_object_detail_is_passed_through() {
        let error = ApiError::new(StatusCode::CONFLICT, json!({ "field": "taken" }));
        assert_eq!(error.body(), json!({ "field": "taken" }));
    }

    #[test]
    fn test_from_status_uses_reason_phrase() {
        let error = ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.detail, json!("Method Not Allowed"));
    }
}
