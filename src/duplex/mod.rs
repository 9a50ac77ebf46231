//! Duplex connection subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch task (one per connection):
//!     admit   ──┐
//!     remove  ──┼──▶ registry worker (owns the connection table)
//!               │         │
//! Listener thread:        ▼
//!     broker ──▶ deliver ─┘   control channel ──▶ connection receive loop
//! ```
//!
//! # Design Decisions
//! - The connection table is mutated only by the registry worker task
//! - The blocking broker subscription lives on its own OS thread and hands
//!   events over with `blocking_send`
//! - Sends and closes requested through the registry are executed by the
//!   connection's own receive loop, which owns the connection

pub mod broker;
pub mod connection;
pub mod event;
pub mod listener;
pub mod registry;

pub use broker::{Broker, BrokerError, MemoryBroker, Subscription};
pub use connection::{ConnectionId, DuplexConnection, DuplexState};
pub use event::{DuplexAction, DuplexEvent};
pub use listener::spawn_listener;
pub use registry::{DuplexRegistry, RegistryError, RegistryHandle};
