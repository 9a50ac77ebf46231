//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, scope + channel pair per connection)
//!     → Dispatcher (routing, middleware, handler)
//!     → request.rs / response.rs (the values handlers see and return)
//!     → websocket.rs (frame bridge for upgraded connections)
//! ```

pub mod content;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::Request;
pub use response::Response;
pub use server::GatewayServer;
