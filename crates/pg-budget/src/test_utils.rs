//! Deterministic port doubles for testing.
//!
//! Enable with the `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust
//! use pg_budget::test_utils::FixedTimeSource;
//! use pg_budget::TimeSource;
//!
//! let time = FixedTimeSource::new(1_700_000_000);
//! time.advance(60);
//! assert_eq!(time.now(), 1_700_000_060);
//! ```

use crate::domain::{commitment_script, double_sha256, Hash256, OutPoint};
use crate::domain::params::PROPOSAL_FEE;
use crate::events::{InventoryItem, OutboundMessage};
use crate::ports::outbound::{
    BlockInfo, ChainOracle, ChainTip, MasternodeInfo, MasternodeRegistry, PeerId, PeerInfo,
    PeerNetwork, SigningOracle, SyncAsset, SyncMonitor, TimeSource, TransactionInfo, TxOutput,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now: AtomicI64,
}

impl FixedTimeSource {
    pub fn new(timestamp: i64) -> Self {
        Self {
            now: AtomicI64::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: i64) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl TimeSource for Arc<FixedTimeSource> {
    fn now(&self) -> i64 {
        self.as_ref().now()
    }
}

// ============================================================================
// Chain
// ============================================================================

#[derive(Debug, Default)]
struct ChainState {
    tip: Option<ChainTip>,
    adjusted_time: i64,
    transactions: HashMap<Hash256, TransactionInfo>,
    blocks: HashMap<Hash256, BlockInfo>,
}

/// In-memory chain with helpers to fund proposal collateral.
#[derive(Debug, Default)]
pub struct MockChain {
    state: RwLock<ChainState>,
}

impl MockChain {
    pub fn new(height: i64, time: i64) -> Self {
        let chain = Self::default();
        chain.set_tip(height, time);
        chain.set_adjusted_time(time);
        chain
    }

    /// A chain that has not loaded its tip yet.
    pub fn without_tip() -> Self {
        Self::default()
    }

    pub fn set_tip(&self, height: i64, time: i64) {
        self.state.write().tip = Some(ChainTip { height, time });
    }

    pub fn set_adjusted_time(&self, time: i64) {
        self.state.write().adjusted_time = time;
    }

    pub fn insert_transaction(&self, tx: TransactionInfo) {
        self.state.write().transactions.insert(tx.hash, tx);
    }

    pub fn insert_block(&self, hash: Hash256, block: BlockInfo) {
        self.state.write().blocks.insert(hash, block);
    }

    /// Mine a collateral transaction committing to `proposal` with the given
    /// depth below the current tip. Returns the fee transaction hash.
    pub fn fund_proposal(&self, proposal: &Hash256, confirmations: i64, block_time: i64) -> Hash256 {
        let mut seed = proposal.as_bytes().to_vec();
        seed.extend_from_slice(b"fee");
        let fee_tx = double_sha256(&seed);
        seed.extend_from_slice(b"block");
        let block_hash = double_sha256(&seed);

        let tip_height = self.state.read().tip.map_or(0, |tip| tip.height);
        self.insert_block(
            block_hash,
            BlockInfo {
                height: tip_height - confirmations + 1,
                time: block_time,
                in_active_chain: confirmations > 0,
            },
        );
        self.insert_transaction(TransactionInfo {
            hash: fee_tx,
            lock_time: 0,
            outputs: vec![TxOutput {
                value: PROPOSAL_FEE,
                script: commitment_script(proposal),
            }],
            instant_confirmations: 0,
            block_hash: Some(block_hash),
        });
        fee_tx
    }
}

impl ChainOracle for MockChain {
    fn tip(&self) -> Option<ChainTip> {
        self.state.read().tip
    }

    fn get_transaction(&self, hash: &Hash256) -> Option<TransactionInfo> {
        self.state.read().transactions.get(hash).cloned()
    }

    fn get_block(&self, hash: &Hash256) -> Option<BlockInfo> {
        self.state.read().blocks.get(hash).copied()
    }

    fn adjusted_time(&self) -> i64 {
        self.state.read().adjusted_time
    }
}

// ============================================================================
// Masternodes
// ============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    nodes: HashMap<OutPoint, (MasternodeInfo, bool)>,
    enabled_override: Option<i64>,
}

/// Masternode list keyed by collateral.
#[derive(Debug, Default)]
pub struct MockRegistry {
    state: RwLock<RegistryState>,
    asked: Mutex<Vec<(PeerId, OutPoint)>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a voting-eligible masternode.
    pub fn add_pillar(&self, collateral: OutPoint, pubkey: Vec<u8>) {
        self.insert(collateral, pubkey, true);
    }

    /// Register a masternode that may not vote.
    pub fn add_non_pillar(&self, collateral: OutPoint, pubkey: Vec<u8>) {
        self.insert(collateral, pubkey, false);
    }

    fn insert(&self, collateral: OutPoint, pubkey: Vec<u8>, pillar: bool) {
        let info = MasternodeInfo {
            collateral,
            pubkey,
            protocol_version: 70_920,
        };
        self.state.write().nodes.insert(collateral, (info, pillar));
    }

    pub fn remove(&self, collateral: &OutPoint) {
        self.state.write().nodes.remove(collateral);
    }

    /// Pin the enabled count instead of counting registered pillars.
    pub fn set_enabled_count(&self, count: i64) {
        self.state.write().enabled_override = Some(count);
    }

    /// Masternode requests issued so far.
    pub fn asked(&self) -> Vec<(PeerId, OutPoint)> {
        self.asked.lock().clone()
    }
}

impl MasternodeRegistry for MockRegistry {
    fn find(&self, collateral: &OutPoint) -> Option<MasternodeInfo> {
        self.state.read().nodes.get(collateral).map(|(info, _)| info.clone())
    }

    fn find_by_pubkey(&self, pubkey: &[u8]) -> Option<MasternodeInfo> {
        self.state
            .read()
            .nodes
            .values()
            .find(|(info, _)| info.pubkey == pubkey)
            .map(|(info, _)| info.clone())
    }

    fn is_pillar(&self, collateral: &OutPoint) -> bool {
        self.state
            .read()
            .nodes
            .get(collateral)
            .is_some_and(|(_, pillar)| *pillar)
    }

    fn count_enabled(&self) -> i64 {
        let state = self.state.read();
        state
            .enabled_override
            .unwrap_or_else(|| state.nodes.values().filter(|(_, pillar)| *pillar).count() as i64)
    }

    fn ask_for_masternode(&self, peer: PeerId, collateral: &OutPoint) {
        self.asked.lock().push((peer, *collateral));
    }
}

// ============================================================================
// Signing
// ============================================================================

/// Hash-based stand-in for ECDSA.
///
/// The public key is `sha256d(secret)` and a signature is
/// `sha256d(pubkey || message)`. Anyone holding the public key can forge a
/// signature, which is fine for tests and nothing else.
#[derive(Debug, Clone)]
pub struct FakeSigner {
    spork_secret: Vec<u8>,
}

impl FakeSigner {
    pub const SPORK_SECRET: &'static [u8] = b"spork-secret";

    pub fn new() -> Self {
        Self {
            spork_secret: Self::SPORK_SECRET.to_vec(),
        }
    }

    pub fn pubkey_for(secret: &[u8]) -> Vec<u8> {
        double_sha256(secret).as_bytes().to_vec()
    }

    pub fn signature_for(secret: &[u8], message: &[u8]) -> Vec<u8> {
        let mut data = Self::pubkey_for(secret);
        data.extend_from_slice(message);
        double_sha256(&data).as_bytes().to_vec()
    }
}

impl Default for FakeSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningOracle for FakeSigner {
    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, String> {
        if secret_key.is_empty() {
            return Err("empty secret key".to_string());
        }
        Ok(Self::signature_for(secret_key, message))
    }

    fn verify(&self, pubkey: &[u8], signature: &[u8], message: &[u8]) -> bool {
        let mut data = pubkey.to_vec();
        data.extend_from_slice(message);
        double_sha256(&data).as_bytes().as_slice() == signature
    }

    fn public_key(&self, secret_key: &[u8]) -> Result<Vec<u8>, String> {
        if secret_key.is_empty() {
            return Err("empty secret key".to_string());
        }
        Ok(Self::pubkey_for(secret_key))
    }

    fn spork_pubkey(&self) -> Vec<u8> {
        Self::pubkey_for(&self.spork_secret)
    }
}

// ============================================================================
// Network and sync
// ============================================================================

/// Records everything the service sends.
#[derive(Debug, Default)]
pub struct MockNetwork {
    peers: RwLock<Vec<PeerInfo>>,
    sent: Mutex<Vec<(PeerId, OutboundMessage)>>,
    relayed: Mutex<Vec<InventoryItem>>,
    penalties: Mutex<Vec<(PeerId, u32)>>,
    fulfilled: Mutex<HashSet<(PeerId, String)>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, peer_id: PeerId, protocol_version: u32) {
        self.peers.write().push(PeerInfo {
            peer_id,
            protocol_version,
        });
    }

    pub fn sent(&self) -> Vec<(PeerId, OutboundMessage)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, peer: PeerId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == peer)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn relayed(&self) -> Vec<InventoryItem> {
        self.relayed.lock().clone()
    }

    pub fn penalties(&self) -> Vec<(PeerId, u32)> {
        self.penalties.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.relayed.lock().clear();
        self.penalties.lock().clear();
    }
}

impl PeerNetwork for MockNetwork {
    fn connected_peers(&self) -> Vec<PeerInfo> {
        self.peers.read().clone()
    }

    fn send(&self, peer: PeerId, message: OutboundMessage) {
        self.sent.lock().push((peer, message));
    }

    fn relay(&self, item: InventoryItem) {
        self.relayed.lock().push(item);
    }

    fn misbehaving(&self, peer: PeerId, penalty: u32) {
        self.penalties.lock().push((peer, penalty));
    }

    fn has_fulfilled_request(&self, peer: PeerId, request: &str) -> bool {
        self.fulfilled.lock().contains(&(peer, request.to_string()))
    }

    fn fulfilled_request(&self, peer: PeerId, request: &str) {
        self.fulfilled.lock().insert((peer, request.to_string()));
    }
}

/// Sync state with switches for every stage.
#[derive(Debug)]
pub struct MockSync {
    blockchain_synced: AtomicBool,
    synced: AtomicBool,
    asset: Mutex<SyncAsset>,
    added: Mutex<Vec<Hash256>>,
}

impl MockSync {
    /// Fully synced node.
    pub fn synced() -> Self {
        Self {
            blockchain_synced: AtomicBool::new(true),
            synced: AtomicBool::new(true),
            asset: Mutex::new(SyncAsset::Finished),
            added: Mutex::new(Vec::new()),
        }
    }

    /// Node still downloading blocks.
    pub fn syncing() -> Self {
        Self {
            blockchain_synced: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            asset: Mutex::new(SyncAsset::Initial),
            added: Mutex::new(Vec::new()),
        }
    }

    pub fn set_blockchain_synced(&self, value: bool) {
        self.blockchain_synced.store(value, Ordering::SeqCst);
    }

    pub fn set_synced(&self, value: bool) {
        self.synced.store(value, Ordering::SeqCst);
    }

    pub fn set_asset(&self, asset: SyncAsset) {
        *self.asset.lock() = asset;
    }

    pub fn added_items(&self) -> Vec<Hash256> {
        self.added.lock().clone()
    }
}

impl SyncMonitor for MockSync {
    fn is_blockchain_synced(&self) -> bool {
        self.blockchain_synced.load(Ordering::SeqCst)
    }

    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn requested_asset(&self) -> SyncAsset {
        *self.asset.lock()
    }

    fn added_budget_item(&self, hash: &Hash256) {
        self.added.lock().push(*hash);
    }
}
