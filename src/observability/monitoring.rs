//! Per-dispatch monitoring hook.
//!
//! The monitor is told when a dispatch starts and how it ended. It is
//! synchronous and cannot change what the client sees.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitoringConfig;
use crate::protocol::Scope;

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A request was answered with this status.
    Status(u16),
    /// A duplex connection was admitted.
    Accepted,
    /// A duplex connection was turned away before its pre-hooks completed.
    Rejected,
    /// A duplex connection finished after its pre-hooks ran.
    Closed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected => f.write_str("rejected"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

pub trait Monitor: Send + Sync {
    fn before(&self, _scope: &Scope) {}

    fn after(&self, scope: &Scope, outcome: &Outcome, elapsed: Duration);
}

/// Writes one line per dispatch on the `monitoring` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn after(&self, scope: &Scope, outcome: &Outcome, elapsed: Duration) {
        let client = scope
            .client
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        tracing::info!(
            target: "monitoring",
            method = %scope.method,
            path = %scope.path,
            client = %client,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            outcome = %outcome,
            "dispatch finished"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn after(&self, _scope: &Scope, _outcome: &Outcome, _elapsed: Duration) {}
}

/// The monitor selected by configuration.
pub fn from_config(config: &MonitoringConfig) -> Arc<dyn Monitor> {
    if config.enabled {
        Arc::new(LogMonitor)
    } else {
        Arc::new(NoopMonitor)
    }
}
