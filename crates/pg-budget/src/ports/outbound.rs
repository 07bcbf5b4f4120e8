//! Outbound ports (SPI) for the governance subsystem.
//!
//! Everything the budget system needs from the rest of the node: the chain,
//! the masternode list, message signing, the P2P layer and sync progress.

use crate::domain::{Hash256, OutPoint};
use crate::events::{InventoryItem, OutboundMessage};

/// Network-local peer handle.
pub type PeerId = u64;

/// Active chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: i64,
    pub time: i64,
}

/// One transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: i64,
    pub script: Vec<u8>,
}

/// Transaction as seen by the collateral check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: Hash256,
    pub lock_time: u32,
    pub outputs: Vec<TxOutput>,
    /// Confirmations vouched for by instant-send locks.
    pub instant_confirmations: i64,
    /// Containing block, if mined.
    pub block_hash: Option<Hash256>,
}

/// Block index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: i64,
    pub time: i64,
    pub in_active_chain: bool,
}

/// Read access to the blockchain.
pub trait ChainOracle: Send + Sync {
    /// Current tip, `None` while the chain is still loading.
    fn tip(&self) -> Option<ChainTip>;

    fn get_transaction(&self, hash: &Hash256) -> Option<TransactionInfo>;

    fn get_block(&self, hash: &Hash256) -> Option<BlockInfo>;

    /// Network-adjusted time in unix seconds.
    fn adjusted_time(&self) -> i64;
}

/// Registered masternode record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasternodeInfo {
    pub collateral: OutPoint,
    /// Key votes are verified against.
    pub pubkey: Vec<u8>,
    pub protocol_version: u32,
}

/// The masternode list. Registration and election live elsewhere.
pub trait MasternodeRegistry: Send + Sync {
    fn find(&self, collateral: &OutPoint) -> Option<MasternodeInfo>;

    fn find_by_pubkey(&self, pubkey: &[u8]) -> Option<MasternodeInfo>;

    /// Whether the masternode currently qualifies to vote.
    fn is_pillar(&self, collateral: &OutPoint) -> bool;

    /// Enabled masternodes at the active protocol. Voting-weight denominator.
    fn count_enabled(&self) -> i64;

    /// Ask `peer` for a masternode entry we do not have.
    fn ask_for_masternode(&self, peer: PeerId, collateral: &OutPoint);
}

/// Message signing and verification.
pub trait SigningOracle: Send + Sync {
    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, String>;

    fn verify(&self, pubkey: &[u8], signature: &[u8], message: &[u8]) -> bool;

    /// Public key matching `secret_key`.
    fn public_key(&self, secret_key: &[u8]) -> Result<Vec<u8>, String>;

    /// The network-wide spork authority key.
    fn spork_pubkey(&self) -> Vec<u8>;
}

/// Connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub protocol_version: u32,
}

/// P2P layer.
pub trait PeerNetwork: Send + Sync {
    fn connected_peers(&self) -> Vec<PeerInfo>;

    fn send(&self, peer: PeerId, message: OutboundMessage);

    /// Announce an inventory item to all peers.
    fn relay(&self, item: InventoryItem);

    /// Add `penalty` to the peer's misbehaviour score.
    fn misbehaving(&self, peer: PeerId, penalty: u32);

    fn has_fulfilled_request(&self, peer: PeerId, request: &str) -> bool;

    fn fulfilled_request(&self, peer: PeerId, request: &str);
}

/// Masternode sync stages, in the order they are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncAsset {
    Initial,
    Sporks,
    List,
    Winners,
    Budget,
    Finished,
}

/// Node sync progress.
pub trait SyncMonitor: Send + Sync {
    fn is_blockchain_synced(&self) -> bool;

    /// Masternode data (list, winners, budget) fully synced.
    fn is_synced(&self) -> bool;

    fn requested_asset(&self) -> SyncAsset;

    /// A budget item arrived; feeds the sync progress counter.
    fn added_budget_item(&self, hash: &Hash256);
}

/// Local clock.
pub trait TimeSource: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now(&self) -> i64;
}

/// Default time source using system time
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}
