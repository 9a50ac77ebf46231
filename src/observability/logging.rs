//! Structured logging.
//!
//! Uses `tracing-subscriber` with an `EnvFilter`: `RUST_LOG` wins, otherwise
//! the configured level applies. JSON output for production, the pretty
//! format for development.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

fn default_directives(level: &str) -> String {
    format!("gateway_dispatch={level},monitoring={level},tower_http={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_crate_and_monitor() {
        let directives = default_directives("debug");
        assert!(directives.contains("gateway_dispatch=debug"));
        assert!(directives.contains("monitoring=debug"));
        assert!(directives.parse::<EnvFilter>().is_ok());
    }
}
