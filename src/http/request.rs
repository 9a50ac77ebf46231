//! Request-style connection object handed to handlers.
//!
//! # Responsibilities
//! - Carry the scope, the fully read body and the path variables
//! - Decode the body according to its content type
//! - Hold per-request extensions attached by middleware (identity, request ID)

use std::collections::HashMap;

use axum::http::{Extensions, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::content::read_multipart_form_data;
use crate::protocol::Scope;
use crate::routing::PathVariables;

#[derive(Debug)]
pub struct Request {
    scope: Scope,
    body: Bytes,
    path_variables: PathVariables,
    extensions: Extensions,
}

impl Request {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            body: Bytes::new(),
            path_variables: PathVariables::default(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn method(&self) -> &Method {
        &self.scope.method
    }

    pub fn path(&self) -> &str {
        &self.scope.path
    }

    pub fn query_string(&self) -> &str {
        &self.scope.query_string
    }

    /// Query parameters as a map; later duplicates win.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.scope
            .query_string
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_owned(), v.to_owned()),
                None => (pair.to_owned(), String::new()),
            })
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.scope.header(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.scope.content_type()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path_variables(&self) -> &PathVariables {
        &self.path_variables
    }

    pub(crate) fn set_path_variables(&mut self, path_variables: PathVariables) {
        self.path_variables = path_variables;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Body decoded by content type.
    ///
    /// JSON bodies are parsed, multipart form bodies become an object of
    /// their simple fields, anything else is returned as text. An empty body
    /// is `null`.
    pub fn data(&self) -> Result<Value, ApiError> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }

        let content_type = self.content_type().unwrap_or_default();
        if content_type.starts_with("application/json") {
            serde_json::from_slice(&self.body)
                .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
        } else if content_type.starts_with("multipart/form-data") {
            let text = String::from_utf8_lossy(&self.body);
            let fields = read_multipart_form_data(content_type, &text);
            Ok(Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            ))
        } else {
            Ok(Value::String(String::from_utf8_lossy(&self.body).into_owned()))
        }
    }

    /// Deserialize a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
    }
}
