//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc with the dispatcher and the host adapter
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide global
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{DuplexConfig, GatewayConfig, ListenerConfig, MonitoringConfig, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};
