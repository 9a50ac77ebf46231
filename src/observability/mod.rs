//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and duplex subsystem produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → monitoring.rs (one line per dispatch, when enabled)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap and recorded whether or not an exporter is installed
//! - The monitor observes dispatches but never alters them

pub mod logging;
pub mod metrics;
pub mod monitoring;

pub use monitoring::{LogMonitor, Monitor, NoopMonitor, Outcome};
