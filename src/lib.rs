//! Gateway dispatch core.
//!
//! Sits between a host that speaks the gateway protocol (connection scope
//! plus inbound/outbound event channels) and application handlers.
//!
//! ```text
//!     host adapter ──▶ dispatch ──▶ routing ──▶ middleware ──▶ handler
//!                          │
//!                          └──▶ duplex registry ◀── broker listener thread
//! ```

// Core subsystems
pub mod dispatch;
pub mod duplex;
pub mod error;
pub mod http;
pub mod middleware;
pub mod protocol;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use duplex::{ConnectionId, DuplexConnection, MemoryBroker, RegistryHandle};
pub use error::{ApiError, HandlerError, HostError, StartupError};
pub use http::{GatewayServer, Request, Response};
pub use lifecycle::Shutdown;
pub use middleware::Middleware;
pub use protocol::{HostIo, HostSide, InboundEvent, Message, OutboundEvent, Scope};
pub use routing::{
    DuplexHandler, Endpoint, PathVariables, RequestHandler, ResourceHandler, RouteTable,
};
