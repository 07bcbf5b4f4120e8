//! # pg-budget
//!
//! Masternode budget governance for Pillar Governance.
//!
//! ## Architecture
//!
//! Anyone funding a collateral transaction can submit a budget proposal.
//! Voting-eligible masternodes ("pillars") vote on it, and proposals with
//! enough net support and age are funded at each superblock.
//!
//! ```text
//!   peers ──mnvs/mprop/mvote──→ [GovernanceService] ──inv/ssc/mnvs──→ peers
//!                                   │        │
//!           BudgetApi (RPC) ───────→│        ├──→ ChainOracle (collateral, tip)
//!                                   │        ├──→ MasternodeRegistry
//!                                   ↓        ├──→ SigningOracle
//!                             [BudgetLedger] └──→ SyncMonitor
//!                                   │
//!                                   ↓
//!                          BudgetDb (budget.dat)
//! ```
//!
//! | Layer | Module | Contents |
//! |-------|--------|----------|
//! | Domain | [`domain`] | Entities, ledger, collateral rules, file format |
//! | Ports | [`ports`] | `BudgetApi` inbound, chain/registry/signer/network/sync outbound |
//! | Events | [`events`] | `mnvs`, `mprop`, `mvote` codec and outbound messages |
//! | Adapters | [`adapters`] | `budget.dat` store, secp256k1 signer |
//! | Service | [`service`] | Message handling, maintenance, voting, persistence |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pg_budget::{GovernanceConfig, GovernanceDependencies, GovernanceService};
//!
//! let config = GovernanceConfig::load("governance.toml")?.with_env_overrides()?;
//! let service = GovernanceService::new(GovernanceDependencies {
//!     chain, registry, signer, network, sync, config,
//! });
//! service.load_budgets().ok();
//!
//! // From the block connection path
//! service.new_block(height);
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types
pub use adapters::{BudgetDb, Secp256k1Signer, SignerError};
pub use config::{ConfigError, GovernanceConfig, LocalMasternode, MasternodeEntry, SecretKey};
pub use domain::{
    BudgetLedger, BudgetProposal, BudgetVote, ErrorKind, GovernanceError, GovernanceResult,
    Hash256, LedgerLimits, Network, NetworkParams, OutPoint, ProposalBroadcast, VoteOutcome,
};
pub use events::{GovernanceMessage, InventoryItem, InventoryPayload, OutboundMessage, WireError};
pub use ports::{
    BudgetApi, ChainOracle, MasternodeRegistry, PeerNetwork, SigningOracle, SyncMonitor,
    TimeSource, VoteMode, VoteReport,
};
pub use service::{GovernanceDependencies, GovernanceService};
