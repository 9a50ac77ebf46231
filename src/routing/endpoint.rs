//! Handler contracts and the endpoint variant stored in each route.
//!
//! # Design Decisions
//! - Handler capability is a type, not a runtime check: a route holds one of
//!   three statically known kinds
//! - A kind that does not fit the connection (e.g. a duplex endpoint hit by a
//!   plain request) is still reported at dispatch as a misconfiguration

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::duplex::DuplexConnection;
use crate::error::{ApiError, HandlerError, HostError};
use crate::http::{Request, Response};
use crate::protocol::Message;
use crate::routing::PathVariables;

pub type HandlerResult = Result<Response, HandlerError>;

/// A standalone request handler.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn call(&self, request: Request, path_variables: PathVariables) -> HandlerResult;
}

/// Adapts an async function or closure into a [`RequestHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request, PathVariables) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, request: Request, path_variables: PathVariables) -> HandlerResult {
        (self.f)(request, path_variables).await
    }
}

/// A handler with one method per HTTP verb.
///
/// Verbs left unimplemented answer `405 Method Not Allowed`.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn get(&self, _request: Request, _path_variables: PathVariables) -> HandlerResult {
        Err(ApiError::method_not_allowed().into())
    }

    async fn post(&self, _request: Request, _path_variables: PathVariables) -> HandlerResult {
        Err(ApiError::method_not_allowed().into())
    }

    async fn put(&self, _request: Request, _path_variables: PathVariables) -> HandlerResult {
        Err(ApiError::method_not_allowed().into())
    }

    async fn patch(&self, _request: Request, _path_variables: PathVariables) -> HandlerResult {
        Err(ApiError::method_not_allowed().into())
    }

    async fn delete(&self, _request: Request, _path_variables: PathVariables) -> HandlerResult {
        Err(ApiError::method_not_allowed().into())
    }
}

/// Route a request to the resource method matching its verb.
pub(crate) async fn call_method(
    handler: &dyn ResourceHandler,
    request: Request,
    path_variables: PathVariables,
) -> HandlerResult {
    let method = request.method().clone();
    match method.as_str() {
        "GET" => handler.get(request, path_variables).await,
        "POST" => handler.post(request, path_variables).await,
        "PUT" => handler.put(request, path_variables).await,
        "PATCH" => handler.patch(request, path_variables).await,
        "DELETE" => handler.delete(request, path_variables).await,
        _ => Err(ApiError::method_not_allowed().into()),
    }
}

/// A handler that drives a duplex connection.
///
/// The dispatcher owns the receive loop and calls [`receive`](Self::receive)
/// once per inbound message. Returning [`HostError`] ends the loop.
#[async_trait]
pub trait DuplexHandler: Send + Sync {
    /// Runs once after admission, before the connection is registered.
    async fn connect(&self, connection: &mut DuplexConnection) -> Result<(), HostError> {
        connection.accept().await
    }

    async fn receive(
        &self,
        connection: &mut DuplexConnection,
        message: Message,
    ) -> Result<(), HostError>;

    /// Runs once after the connection left the registry.
    async fn disconnect(&self, _connection: &DuplexConnection) {}
}

/// Handler capability stored in a route.
#[derive(Clone)]
pub enum EndpointKind {
    Function(Arc<dyn RequestHandler>),
    Resource(Arc<dyn ResourceHandler>),
    Duplex(Arc<dyn DuplexHandler>),
}

/// A named handler reference.
#[derive(Clone)]
pub struct Endpoint {
    name: &'static str,
    kind: EndpointKind,
}

impl Endpoint {
    /// Wrap an async function taking `(Request, PathVariables)`.
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, PathVariables) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: std::any::type_name::<F>(),
            kind: EndpointKind::Function(Arc::new(FnHandler::new(f))),
        }
    }

    pub fn handler<H: RequestHandler + 'static>(handler: H) -> Self {
        Self {
            name: std::any::type_name::<H>(),
            kind: EndpointKind::Function(Arc::new(handler)),
        }
    }

    pub fn resource<H: ResourceHandler + 'static>(handler: H) -> Self {
        Self {
            name: std::any::type_name::<H>(),
            kind: EndpointKind::Resource(Arc::new(handler)),
        }
    }

    pub fn duplex<H: DuplexHandler + 'static>(handler: H) -> Self {
        Self {
            name: std::any::type_name::<H>(),
            kind: EndpointKind::Duplex(Arc::new(handler)),
        }
    }

    /// Override the name used in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn is_duplex(&self) -> bool {
        matches!(self.kind, EndpointKind::Duplex(_))
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            EndpointKind::Function(_) => "function",
            EndpointKind::Resource(_) => "resource",
            EndpointKind::Duplex(_) => "duplex",
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("kind", &self.label())
            .finish()
    }
}
