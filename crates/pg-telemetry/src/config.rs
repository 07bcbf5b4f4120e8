//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the logging stack.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full `EnvFilter` directive
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include the event target (module path) in output
    pub show_target: bool,

    /// Network identifier (main, testnet, regtest)
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pillar-governance".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            show_target: true,
            network: "main".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PG_SERVICE_NAME`: Service name (default: pillar-governance)
    /// - `PG_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PG_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `PG_SHOW_TARGET`: Include module targets (default: true)
    /// - `PG_NETWORK`: Network name (default: main)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("PG_SERVICE_NAME")
                .unwrap_or_else(|_| "pillar-governance".to_string()),

            log_level: env::var("PG_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("PG_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            show_target: env::var("PG_SHOW_TARGET")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            network: env::var("PG_NETWORK").unwrap_or_else(|_| "main".to_string()),
        }
    }

    /// Configuration for one named component of the node.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("pg-{}", component);
        config
    }

    /// The filter directive handed to `EnvFilter`.
    ///
    /// Bare levels are scoped so that the governance crates log at the
    /// requested level while dependencies stay at `warn`.
    pub fn filter_directive(&self) -> String {
        let level = self.log_level.trim();
        if level.contains('=') || level.contains(',') {
            return level.to_string();
        }
        format!("warn,pg_budget={level},pg_telemetry={level}")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "pillar-governance");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_filter_directive_scopes_bare_level() {
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
            ..TelemetryConfig::default()
        };
        assert_eq!(
            config.filter_directive(),
            "warn,pg_budget=debug,pg_telemetry=debug"
        );
    }

    #[test]
    fn test_filter_directive_passes_full_directive_through() {
        let config = TelemetryConfig {
            log_level: "pg_budget::service=trace".to_string(),
            ..TelemetryConfig::default()
        };
        assert_eq!(config.filter_directive(), "pg_budget::service=trace");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("no"));
        assert!(!parse_flag(""));
    }
}
