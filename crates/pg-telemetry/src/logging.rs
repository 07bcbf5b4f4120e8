//! Structured logging.
//!
//! Every governance event carries a consistent set of fields so that log
//! pipelines can index them:
//! - `component`: Emitting component (ledger, protocol, maintenance, persistence)
//! - `proposal`: Proposal hash, when the event concerns one proposal
//! - `peer_id`: Remote peer, when the event was triggered by the network
//! - Additional context fields

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber described by `config`.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.filter_directive())
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(config.show_target);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        network = %config.network,
        json_logs = config.json_logs,
        "Structured logging configured"
    );

    Ok(())
}

/// Helper to create structured log entries with consistent formatting.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a proposal-related event with standard fields.
#[macro_export]
macro_rules! log_proposal_event {
    ($level:ident, $component:expr, $msg:expr, $proposal:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            proposal = %$proposal,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a peer-related event with standard fields.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $component:expr, $msg:expr, $peer_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            peer_id = %$peer_id,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_config_error() {
        let config = TelemetryConfig {
            log_level: "pg_budget=[".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn test_macros_expand_without_subscriber() {
        let proposal = "ab12";
        let peer = 7u64;
        crate::log_event!(info, "ledger", "plain event", count = 3);
        crate::log_proposal_event!(debug, "ledger", "proposal event", proposal);
        crate::log_peer_event!(warn, "protocol", "peer event", peer, score = 20);
    }
}
