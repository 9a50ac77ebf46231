//! Connection metadata handed over by the host.

use std::net::SocketAddr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Which lifecycle a connection follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// One request, one response.
    Http,
    /// Long-lived duplex connection.
    WebSocket,
}

/// Protocol metadata for one connection.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ConnectionKind,
    pub method: Method,
    pub path: String,
    pub query_string: String,
    /// Header pairs in arrival order. Names keep the host's casing.
    pub headers: Vec<(String, String)>,
    pub client: Option<SocketAddr>,
}

impl Scope {
    /// Scope for a request-style connection.
    pub fn http(method: Method, path: impl Into<String>) -> Self {
        Self {
            kind: ConnectionKind::Http,
            method,
            path: path.into(),
            query_string: String::new(),
            headers: Vec::new(),
            client: None,
        }
    }

    /// Scope for a duplex connection.
    pub fn websocket(path: impl Into<String>) -> Self {
        Self {
            kind: ConnectionKind::WebSocket,
            ..Self::http(Method::GET, path)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self
    }

    pub fn with_client(mut self, client: SocketAddr) -> Self {
        self.client = Some(client);
        self
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
