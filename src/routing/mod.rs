//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path ("/users/42/")
//!     → table.rs (first route whose pattern matches)
//!     → pattern.rs (segment comparison, variable extraction)
//!     → Return: matched Route or None
//!
//! Route Compilation (at startup):
//!     RouteTableBuilder entries (pattern, endpoint)
//!     → Parse patterns into segments
//!     → Reject malformed or duplicate patterns
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Segment-count matching, no regex in the hot path
//! - First registration wins when patterns overlap
//! - Path variables are raw strings; handlers interpret them

pub mod endpoint;
pub mod pattern;
pub mod table;

pub use endpoint::{
    DuplexHandler, Endpoint, EndpointKind, FnHandler, HandlerResult, RequestHandler,
    ResourceHandler,
};
pub use pattern::{collect_path_variables, PathVariables, Pattern, Segment};
pub use table::{Route, RouteError, RouteTable, RouteTableBuilder};
