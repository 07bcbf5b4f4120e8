//! # Pillar Governance Telemetry
//!
//! Structured logging bootstrap shared by the governance crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pg_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_telemetry(&config).expect("Failed to init telemetry");
//!
//!     // Governance events are now written to stdout
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PG_SERVICE_NAME` | `pillar-governance` | Service name in log lines |
//! | `PG_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PG_JSON_LOGS` | `false` | Emit JSON instead of human-readable lines |
//! | `PG_SHOW_TARGET` | `true` | Include module targets |
//! | `PG_NETWORK` | `main` | Network name attached at startup |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for the process.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_logging(config)?;
    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}

/// Convenience macro for creating a span with component context.
///
/// # Example
///
/// ```rust,ignore
/// use pg_telemetry::component_span;
///
/// fn sweep() {
///     let _span = component_span!("sweep", component = "maintenance", height = 1400).entered();
/// }
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_config() {
        let config = TelemetryConfig::for_component("budget");
        assert_eq!(config.service_name, "pg-budget");
    }
}
