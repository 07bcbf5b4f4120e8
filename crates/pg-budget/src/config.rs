//! Governance configuration.
//!
//! Loaded from TOML, then overridden by `PG_*` environment variables.
//!
//! ```toml
//! network = "testnet"
//! data_dir = "/var/lib/pillar"
//! lite_mode = false
//!
//! [maintenance]
//! interval_blocks = 14
//! full_resync_window = 1440
//! min_peer_protocol = 70920
//!
//! [limits]
//! max_orphan_votes = 10000
//! max_immature = 1000
//!
//! [spork]
//! private_key = "<hex>"
//!
//! [local_masternode]
//! collateral = "<txid>-0"
//! private_key = "<hex>"
//!
//! [[masternodes]]
//! alias = "mn1"
//! collateral = "<txid>-1"
//! private_key = "<hex>"
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PG_NETWORK` | `network` |
//! | `PG_DATA_DIR` | `data_dir` |
//! | `PG_LITE_MODE` | `lite_mode` |
//! | `PG_SPORK_KEY` | `spork.private_key` |

use crate::domain::{LedgerLimits, Network, NetworkParams, OutPoint};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Secret key bytes, wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<Vec<u8>>);

impl SecretKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_hex(field: &str, value: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(value.trim()).map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "empty key".to_string(),
            });
        }
        Ok(Self::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// This node's own masternode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMasternode {
    pub collateral: OutPoint,
    pub key: SecretKey,
}

/// A masternode this node may vote for (vote-many / vote-alias).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasternodeEntry {
    pub alias: String,
    pub collateral: OutPoint,
    pub key: SecretKey,
}

#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub network: Network,
    pub data_dir: PathBuf,
    /// Governance messages are ignored in lite mode.
    pub lite_mode: bool,
    /// Maintenance runs on heights divisible by this.
    pub maintenance_interval: i64,
    /// Seen caches are cleared with probability 1/window per maintenance pass. Zero disables.
    pub full_resync_window: u32,
    pub min_peer_protocol: u32,
    pub limits: LedgerLimits,
    pub spork_key: Option<SecretKey>,
    pub local_masternode: Option<LocalMasternode>,
    pub masternodes: Vec<MasternodeEntry>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            network: Network::Main,
            data_dir: PathBuf::from("."),
            lite_mode: false,
            maintenance_interval: 14,
            full_resync_window: 1440,
            min_peer_protocol: 70_920,
            limits: LedgerLimits::default(),
            spork_key: None,
            local_masternode: None,
            masternodes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    network: Option<String>,
    data_dir: Option<PathBuf>,
    lite_mode: Option<bool>,
    #[serde(default)]
    maintenance: MaintenanceSection,
    #[serde(default)]
    limits: LimitsSection,
    #[serde(default)]
    spork: SporkSection,
    local_masternode: Option<KeySection>,
    #[serde(default)]
    masternodes: Vec<AliasSection>,
}

#[derive(Debug, Deserialize, Default)]
struct MaintenanceSection {
    interval_blocks: Option<i64>,
    full_resync_window: Option<u32>,
    min_peer_protocol: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LimitsSection {
    max_orphan_votes: Option<usize>,
    max_immature: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SporkSection {
    private_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeySection {
    collateral: String,
    private_key: String,
}

#[derive(Debug, Deserialize)]
struct AliasSection {
    alias: String,
    collateral: String,
    private_key: String,
}

fn parse_outpoint(field: &str, value: &str) -> Result<OutPoint, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected <txid>-<index>, got {value}"),
    })
}

fn parse_network(field: &str, value: &str) -> Result<Network, ConfigError> {
    value.parse().map_err(|reason| ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    })
}

impl GovernanceConfig {
    /// Load from a TOML file. Environment overrides are not applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML document, filling unset fields with defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let defaults = Self::default();

        let network = match file.network.as_deref() {
            Some(value) => parse_network("network", value)?,
            None => defaults.network,
        };

        let maintenance_interval = file
            .maintenance
            .interval_blocks
            .unwrap_or(defaults.maintenance_interval);
        if maintenance_interval <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "maintenance.interval_blocks".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let spork_key = file
            .spork
            .private_key
            .as_deref()
            .map(|key| SecretKey::from_hex("spork.private_key", key))
            .transpose()?;

        let local_masternode = file
            .local_masternode
            .map(|section| -> Result<LocalMasternode, ConfigError> {
                Ok(LocalMasternode {
                    collateral: parse_outpoint("local_masternode.collateral", &section.collateral)?,
                    key: SecretKey::from_hex("local_masternode.private_key", &section.private_key)?,
                })
            })
            .transpose()?;

        let masternodes = file
            .masternodes
            .into_iter()
            .map(|section| {
                Ok(MasternodeEntry {
                    collateral: parse_outpoint("masternodes.collateral", &section.collateral)?,
                    key: SecretKey::from_hex("masternodes.private_key", &section.private_key)?,
                    alias: section.alias,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            network,
            data_dir: file.data_dir.unwrap_or(defaults.data_dir),
            lite_mode: file.lite_mode.unwrap_or(defaults.lite_mode),
            maintenance_interval,
            full_resync_window: file
                .maintenance
                .full_resync_window
                .unwrap_or(defaults.full_resync_window),
            min_peer_protocol: file
                .maintenance
                .min_peer_protocol
                .unwrap_or(defaults.min_peer_protocol),
            limits: LedgerLimits {
                max_orphan_votes: file
                    .limits
                    .max_orphan_votes
                    .unwrap_or(defaults.limits.max_orphan_votes),
                max_immature: file
                    .limits
                    .max_immature
                    .unwrap_or(defaults.limits.max_immature),
            },
            spork_key,
            local_masternode,
            masternodes,
        })
    }

    /// Apply `PG_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PG_NETWORK") {
            self.network = parse_network("PG_NETWORK", &value)?;
        }
        if let Some(value) = lookup("PG_DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("PG_LITE_MODE") {
            self.lite_mode = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(value) = lookup("PG_SPORK_KEY") {
            self.spork_key = Some(SecretKey::from_hex("PG_SPORK_KEY", &value)?);
        }
        Ok(self)
    }

    pub fn network_params(&self) -> NetworkParams {
        NetworkParams::for_network(self.network)
    }

    pub fn find_alias(&self, alias: &str) -> Option<&MasternodeEntry> {
        self.masternodes.iter().find(|entry| entry.alias == alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Hash256;

    fn txid(n: u64) -> String {
        Hash256::from_low_u64(n).to_string()
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = GovernanceConfig::parse("").unwrap();
        assert_eq!(config.network, Network::Main);
        assert_eq!(config.maintenance_interval, 14);
        assert_eq!(config.full_resync_window, 1440);
        assert_eq!(config.limits, LedgerLimits::default());
        assert!(config.spork_key.is_none());
        assert!(config.masternodes.is_empty());
    }

    #[test]
    fn test_full_document() {
        let doc = format!(
            r#"
network = "testnet"
data_dir = "/tmp/pg"
lite_mode = true

[maintenance]
interval_blocks = 7
full_resync_window = 0

[limits]
max_orphan_votes = 5

[spork]
private_key = "0a0b"

[local_masternode]
collateral = "{}-0"
private_key = "01"

[[masternodes]]
alias = "mn1"
collateral = "{}-1"
private_key = "02"
"#,
            txid(1),
            txid(2)
        );
        let config = GovernanceConfig::parse(&doc).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pg"));
        assert!(config.lite_mode);
        assert_eq!(config.maintenance_interval, 7);
        assert_eq!(config.full_resync_window, 0);
        assert_eq!(config.limits.max_orphan_votes, 5);
        assert_eq!(config.limits.max_immature, 1_000);
        assert_eq!(config.spork_key.unwrap().as_bytes(), &[0x0a, 0x0b]);

        let local = config.local_masternode.unwrap();
        assert_eq!(local.collateral, OutPoint::new(Hash256::from_low_u64(1), 0));

        let entry = &config.masternodes[0];
        assert_eq!(entry.alias, "mn1");
        assert_eq!(entry.collateral.index, 1);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            GovernanceConfig::parse("network = \"moon\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            GovernanceConfig::parse("[spork]\nprivate_key = \"zz\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            GovernanceConfig::parse("[maintenance]\ninterval_blocks = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            GovernanceConfig::parse("network = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = GovernanceConfig::default()
            .apply_overrides(|name| match name {
                "PG_NETWORK" => Some("regtest".to_string()),
                "PG_LITE_MODE" => Some("1".to_string()),
                "PG_SPORK_KEY" => Some("ff".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert!(config.lite_mode);
        assert_eq!(config.network_params().required_confirmations, 1);
        assert_eq!(config.spork_key.unwrap().as_bytes(), &[0xff]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GovernanceConfig::load("/nonexistent/pg.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_secret_key_is_not_printed() {
        let key = SecretKey::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", key), "SecretKey(..)");
    }
}
