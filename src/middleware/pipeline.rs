//! Ordered, bidirectional middleware chain.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::dispatch::defect::panic_message;
use crate::duplex::DuplexConnection;
use crate::error::ApiError;
use crate::http::{Request, Response};
use crate::middleware::Middleware;

#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: middlewares.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run pre-hooks in declared order, threading the latest request.
    /// Stops at the first error.
    pub async fn run_before(&self, request: Request) -> Result<Request, ApiError> {
        let mut request = request;
        for middleware in self.middlewares.iter() {
            request = middleware.before(request).await.inspect_err(|error| {
                tracing::debug!(
                    middleware = middleware.name(),
                    status = %error.status,
                    "Pre-hook refused request"
                );
            })?;
        }
        Ok(request)
    }

    /// Run every post-hook in reverse order.
    ///
    /// An [`ApiError`] replaces the response and traversal continues with it.
    /// A panicking hook is logged and skipped, keeping the last good response.
    pub async fn run_after(&self, response: Response) -> Response {
        let mut response = response;
        for middleware in self.middlewares.iter().rev() {
            let previous = response.clone();
            response = match AssertUnwindSafe(middleware.after(response)).catch_unwind().await {
                Ok(Ok(response)) => response,
                Ok(Err(error)) => {
                    tracing::debug!(
                        middleware = middleware.name(),
                        status = %error.status,
                        "Post-hook raised, mapping to response"
                    );
                    Response::from(error)
                }
                Err(panic) => {
                    tracing::error!(
                        middleware = middleware.name(),
                        panic = %panic_message(panic.as_ref()),
                        "Post-hook panicked, continuing with previous response"
                    );
                    previous
                }
            };
        }
        response
    }

    /// Run duplex admission hooks in declared order. Stops at the first error.
    pub async fn run_before_duplex(&self, connection: &mut DuplexConnection) -> Result<(), ApiError> {
        for middleware in self.middlewares.iter() {
            middleware.before_duplex(connection).await.inspect_err(|error| {
                tracing::debug!(
                    middleware = middleware.name(),
                    connection_id = %connection.id(),
                    status = %error.status,
                    "Pre-hook refused duplex connection"
                );
            })?;
        }
        Ok(())
    }

    /// Run every duplex closing hook in reverse order, suppressing failures
    /// one by one.
    pub async fn run_after_duplex(&self, connection: &DuplexConnection) {
        for middleware in self.middlewares.iter().rev() {
            match AssertUnwindSafe(middleware.after_duplex(connection))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::debug!(
                        middleware = middleware.name(),
                        connection_id = %connection.id(),
                        status = %error.status,
                        "Suppressed duplex post-hook error"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        middleware = middleware.name(),
                        connection_id = %connection.id(),
                        panic = %panic_message(panic.as_ref()),
                        "Duplex post-hook panicked"
                    );
                }
            }
        }
    }
}
