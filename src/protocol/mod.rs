//! Host gateway protocol.
//!
//! # Data Flow
//! ```text
//! Host process (HTTP/WebSocket server)
//!     → Scope (kind, method, path, headers)
//!     → InboundEvent stream   ──▶ Dispatcher
//!     ← OutboundEvent stream  ◀── Dispatcher
//! ```
//!
//! # Design Decisions
//! - One pair of channels per connection; the dispatcher never shares them
//! - Request-style connections receive exactly one start frame and one body frame
//! - Duplex connections exchange ordered frames until either side closes

pub mod events;
pub mod host;
pub mod scope;

pub use events::{close_code, InboundEvent, Message, OutboundEvent};
pub use host::{HostIo, HostSide};
pub use scope::{ConnectionKind, Scope};
