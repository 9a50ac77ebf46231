//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! before:  m1 → m2 → m3 → handler
//! after:   m3 → m2 → m1 → framing
//! ```
//!
//! # Design Decisions
//! - Hooks are declared once and shared read-only by every dispatch
//! - Post-hooks always cover the whole chain in reverse, even when a
//!   pre-hook refused the request or the duplex connection
//! - Only [`ApiError`] is expected from a hook; it becomes a response

pub mod pipeline;
pub mod request_id;

use async_trait::async_trait;

use crate::duplex::DuplexConnection;
use crate::error::ApiError;
use crate::http::{Request, Response};

pub use pipeline::Pipeline;
pub use request_id::{RequestId, RequestIdMiddleware, X_REQUEST_ID};

/// Pre/post hooks around every dispatch. All hooks default to pass-through.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// May replace the request, e.g. to attach an authenticated identity.
    async fn before(&self, request: Request) -> Result<Request, ApiError> {
        Ok(request)
    }

    async fn after(&self, response: Response) -> Result<Response, ApiError> {
        Ok(response)
    }

    /// Admission hook for duplex connections. An error refuses admission.
    async fn before_duplex(&self, _connection: &mut DuplexConnection) -> Result<(), ApiError> {
        Ok(())
    }

    /// Runs when the duplex connection is closing. Errors are suppressed.
    async fn after_duplex(&self, _connection: &DuplexConnection) -> Result<(), ApiError> {
        Ok(())
    }
}
