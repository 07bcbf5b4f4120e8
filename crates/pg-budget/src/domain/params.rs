//! Per-network governance constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base units per coin.
pub const COIN: i64 = 100_000_000;

/// Fee burned by a proposal's collateral transaction.
pub const PROPOSAL_FEE: i64 = 5_000 * COIN;

/// Minimum spacing between two votes from the same masternode on one proposal.
pub const VOTE_UPDATE_MIN_SECS: i64 = 60 * 60;

/// Maximum distance a vote timestamp may sit ahead of the local clock.
pub const MAX_VOTE_FUTURE_DRIFT_SECS: i64 = 60 * 60;

/// Lifetime of a "requested source proposal" record.
pub const SOURCE_REQUEST_TTL_SECS: i64 = 60 * 60 * 24;

pub const MAX_PROPOSAL_NAME_LEN: usize = 60;
pub const MAX_PROPOSAL_URL_LEN: usize = 250;

/// Reputation penalty for protocol misbehaviour.
pub const MISBEHAVIOUR_PENALTY: u32 = 20;

/// Chain the node is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Main,
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Main => "main",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

/// Constants the budget system reads from the chain parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
    /// Message-start bytes; also stamped into the budget data file.
    pub message_start: [u8; 4],
    /// Confirmations a collateral transaction needs before its proposal is accepted.
    pub required_confirmations: i64,
    /// Minimum age of a proposal before it can be funded.
    pub establishment_delay_secs: i64,
    /// Length of one budget payment cycle in blocks.
    pub budget_cycle_blocks: i64,
    pub proposal_fee: i64,
}

impl NetworkParams {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self {
                network,
                message_start: [0x90, 0xc4, 0xfd, 0xe9],
                required_confirmations: 6,
                establishment_delay_secs: 60 * 60 * 24,
                budget_cycle_blocks: 43_200,
                proposal_fee: PROPOSAL_FEE,
            },
            Network::Testnet => Self {
                network,
                message_start: [0x45, 0x76, 0x65, 0xba],
                required_confirmations: 3,
                establishment_delay_secs: 60 * 5,
                budget_cycle_blocks: 144,
                proposal_fee: PROPOSAL_FEE,
            },
            Network::Regtest => Self {
                network,
                message_start: [0xa1, 0xcf, 0x7e, 0xac],
                required_confirmations: 1,
                establishment_delay_secs: 0,
                budget_cycle_blocks: 10,
                proposal_fee: PROPOSAL_FEE,
            },
        }
    }

    /// First block of the next payment cycle after `tip_height`.
    pub fn next_superblock(&self, tip_height: i64) -> i64 {
        tip_height - tip_height % self.budget_cycle_blocks + self.budget_cycle_blocks
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::for_network(Network::Main)
    }
}
