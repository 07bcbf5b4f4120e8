//! Governance Service - budget ledger behind the node's ports
//!
//! # Architecture
//! - One mutex guards the ledger; a second serializes P2P message dispatch
//! - Maintenance runs from `new_block` and skips when the ledger is busy
//! - Persistence snapshots under the lock and does file I/O after releasing it

use crate::adapters::BudgetDb;
use crate::config::{GovernanceConfig, SecretKey};
use crate::domain::params::MISBEHAVIOUR_PENALTY;
use crate::domain::validation::{check_lengths, validate_url};
use crate::domain::{
    commitment_script, BudgetLedger, BudgetProposal, BudgetVote, GovernanceError,
    GovernanceResult, Hash256, Network, NetworkParams, OutPoint, PersistenceError, ProposalBroadcast,
    UnknownProposal, ValidationEnv, VoteOrigin, VoteOutcome, VoteRejection,
};
use crate::events::{GovernanceMessage, InventoryItem, InventoryPayload, OutboundMessage};
use crate::ports::{
    BudgetApi, ChainOracle, MasternodeRegistry, PeerId, PeerNetwork, PreparedProposal,
    ProposalInfo, ProposalRequest, SigningOracle, SyncAsset, SyncMonitor, SystemTimeSource,
    TimeSource, VoteInfo, VoteMode, VoteReport, VoteResult,
};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

const COMPONENT: &str = "service";

/// Fulfilled-request key for a full vote sync.
const FULL_SYNC_REQUEST: &str = "budgetvotesync";

/// Governance Service
pub struct GovernanceService<C, R, S, N, Y>
where
    C: ChainOracle,
    R: MasternodeRegistry,
    S: SigningOracle,
    N: PeerNetwork,
    Y: SyncMonitor,
{
    chain: Arc<C>,
    registry: Arc<R>,
    signer: Arc<S>,
    network: Arc<N>,
    sync: Arc<Y>,
    params: NetworkParams,
    config: GovernanceConfig,
    store: BudgetDb,
    ledger: Mutex<BudgetLedger>,
    dispatch: Mutex<()>,
    time_source: Box<dyn TimeSource>,
}

/// Dependencies for GovernanceService
pub struct GovernanceDependencies<C, R, S, N, Y> {
    pub chain: Arc<C>,
    pub registry: Arc<R>,
    pub signer: Arc<S>,
    pub network: Arc<N>,
    pub sync: Arc<Y>,
    pub config: GovernanceConfig,
}

impl<C, R, S, N, Y> GovernanceService<C, R, S, N, Y>
where
    C: ChainOracle,
    R: MasternodeRegistry,
    S: SigningOracle,
    N: PeerNetwork,
    Y: SyncMonitor,
{
    pub fn new(deps: GovernanceDependencies<C, R, S, N, Y>) -> Self {
        let params = deps.config.network_params();
        Self {
            chain: deps.chain,
            registry: deps.registry,
            signer: deps.signer,
            network: deps.network,
            sync: deps.sync,
            store: BudgetDb::in_dir(&deps.config.data_dir, params.message_start),
            ledger: Mutex::new(BudgetLedger::new(deps.config.limits)),
            dispatch: Mutex::new(()),
            params,
            config: deps.config,
            time_source: Box::new(SystemTimeSource),
        }
    }

    /// Set custom time source (for testing)
    pub fn with_time_source(mut self, time_source: Box<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn store(&self) -> &BudgetDb {
        &self.store
    }

    /// Run `f` with the ledger locked.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&BudgetLedger) -> T) -> T {
        f(&self.ledger.lock())
    }

    fn env(&self) -> ValidationEnv<'_> {
        ValidationEnv {
            chain: self.chain.as_ref(),
            registry: self.registry.as_ref(),
            signer: self.signer.as_ref(),
            params: &self.params,
            now: self.time_source.now(),
        }
    }

    // === P2P ===

    /// Decode and process a raw governance payload.
    pub fn process_wire(&self, peer: PeerId, command: &str, payload: &[u8]) -> GovernanceResult<()> {
        let message = GovernanceMessage::decode(command, payload).map_err(|e| {
            pg_telemetry::log_peer_event!(debug, COMPONENT, "undecodable governance message", peer, error = %e);
            GovernanceError::MalformedInput(e.to_string())
        })?;
        self.process_message(peer, message)
    }

    /// Handle one governance message from `peer`.
    pub fn process_message(&self, peer: PeerId, message: GovernanceMessage) -> GovernanceResult<()> {
        if self.config.lite_mode {
            return Err(GovernanceError::NotReady("governance disabled in lite mode".to_string()));
        }
        if !self.sync.is_blockchain_synced() {
            return Err(GovernanceError::NotReady("blockchain not synced".to_string()));
        }

        let _dispatch = self.dispatch.lock();
        match message {
            GovernanceMessage::VoteSync(filter) => self.on_vote_sync(peer, filter),
            GovernanceMessage::Proposal(broadcast) => self.on_proposal(peer, broadcast),
            GovernanceMessage::Vote(vote) => self.on_vote(peer, vote),
        }
    }

    fn on_vote_sync(&self, peer: PeerId, filter: Hash256) -> GovernanceResult<()> {
        if self.params.network == Network::Main && filter.is_zero() {
            if self.network.has_fulfilled_request(peer, FULL_SYNC_REQUEST) {
                pg_telemetry::log_peer_event!(warn, COMPONENT, "peer already asked for a full budget sync", peer);
                self.network.misbehaving(peer, MISBEHAVIOUR_PENALTY);
                return Err(GovernanceError::AlreadySeen(filter));
            }
            self.network.fulfilled_request(peer, FULL_SYNC_REQUEST);
        }

        let ledger = self.ledger.lock();
        self.send_sync(&ledger, peer, &filter, false);
        Ok(())
    }

    fn send_sync(&self, ledger: &BudgetLedger, peer: PeerId, filter: &Hash256, partial: bool) {
        let items = ledger.sync_items(filter, partial);
        let count = items.len();
        for item in items {
            self.network.send(peer, OutboundMessage::Inventory(item));
        }
        self.network.send(
            peer,
            OutboundMessage::SyncStatusCount {
                asset: SyncAsset::Budget,
                count: count as u32,
            },
        );
        pg_telemetry::log_peer_event!(debug, COMPONENT, "sent budget inventory", peer, count, partial);
    }

    fn on_proposal(&self, peer: PeerId, mut broadcast: ProposalBroadcast) -> GovernanceResult<()> {
        let hash = broadcast.hash();
        let env = self.env();
        let mut ledger = self.ledger.lock();

        if ledger.is_broadcast_seen(&hash) {
            self.sync.added_budget_item(&hash);
            return Err(GovernanceError::AlreadySeen(hash));
        }

        if let Err(e) = env.admit_broadcast(&mut broadcast) {
            if e.is_immature() && e.confirmations() >= 1 {
                pg_telemetry::log_proposal_event!(debug, COMPONENT, "queueing immature proposal", hash, confirmations = e.confirmations());
                ledger.queue_immature(broadcast.clone());
            } else {
                pg_telemetry::log_peer_event!(debug, COMPONENT, "rejected proposal broadcast", peer, proposal = %hash, error = %e);
            }
            return Err(GovernanceError::InvalidCollateral {
                name: broadcast.name,
                source: e,
            });
        }

        ledger.insert_seen_broadcast(broadcast.clone());
        let added = ledger.add_proposal(BudgetProposal::from(broadcast), &env);
        if added.is_ok() {
            self.network.relay(InventoryItem::Proposal(hash));
        }
        self.sync.added_budget_item(&hash);
        ledger.check_orphan_votes(&env);

        match added {
            Ok(_) | Err(GovernanceError::ProposalExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn on_vote(&self, peer: PeerId, vote: BudgetVote) -> GovernanceResult<()> {
        let hash = vote.hash();
        let env = self.env();
        let mut ledger = self.ledger.lock();

        if ledger.is_vote_seen(&hash) {
            self.sync.added_budget_item(&hash);
            return Err(GovernanceError::AlreadySeen(hash));
        }

        if self.registry.find(&vote.voter).is_none() {
            pg_telemetry::log_peer_event!(debug, COMPONENT, "vote from unknown masternode", peer, voter = %vote.voter);
            self.registry.ask_for_masternode(peer, &vote.voter);
            return Err(GovernanceError::UnknownMasternode(vote.voter.to_string_short()));
        }
        if !self.registry.is_pillar(&vote.voter) {
            return Err(GovernanceError::NotPillar(vote.voter.to_string_short()));
        }

        ledger.insert_seen_vote(vote.clone());
        if !env.vote_signature_valid(&vote, true) {
            if self.sync.is_synced() {
                pg_telemetry::log_peer_event!(warn, COMPONENT, "invalid budget vote signature", peer, vote = %hash);
                self.network.misbehaving(peer, MISBEHAVIOUR_PENALTY);
            }
            self.registry.ask_for_masternode(peer, &vote.voter);
            return Err(GovernanceError::InvalidSignature(format!("vote {hash}")));
        }

        let origin = VoteOrigin::Peer {
            peer,
            masternodes_synced: self.sync.is_synced(),
        };
        match ledger.update_proposal(vote, origin, &env) {
            Ok(_) => {
                self.network.relay(InventoryItem::Vote(hash));
                self.sync.added_budget_item(&hash);
                Ok(())
            }
            Err(VoteRejection::Unknown(UnknownProposal {
                proposal,
                request_source,
            })) => {
                if request_source {
                    self.network.send(peer, OutboundMessage::VoteSyncRequest(proposal));
                }
                Err(GovernanceError::UnknownProposal(proposal))
            }
            Err(VoteRejection::Invalid(e)) => {
                pg_telemetry::log_peer_event!(debug, COMPONENT, "vote not applied", peer, vote = %hash, error = %e);
                Err(e)
            }
        }
    }

    // === MAINTENANCE ===

    /// Per-block maintenance. Returns false when skipped.
    ///
    /// A maintenance interval of zero or less disables it.
    pub fn new_block(&self, height: i64) -> bool {
        let interval = self.config.maintenance_interval;
        if interval <= 0 || height % interval != 0 {
            return false;
        }
        let Some(mut ledger) = self.ledger.try_lock() else {
            tracing::trace!(component = COMPONENT, height, "ledger busy, skipping maintenance");
            return false;
        };
        if self.sync.requested_asset() <= SyncAsset::Budget {
            return false;
        }

        let _span = pg_telemetry::component_span!("budget_maintenance", component = COMPONENT, height).entered();
        let env = self.env();
        if self.sync.is_synced() {
            if self.roll_full_resync() {
                pg_telemetry::log_event!(info, COMPONENT, "clearing seen budget items for full resync", height = height);
                ledger.clear_seen();
                ledger.reset_sync();
            }
            for peer in self.network.connected_peers() {
                if peer.protocol_version >= self.config.min_peer_protocol {
                    self.send_sync(&ledger, peer.peer_id, &Hash256::ZERO, true);
                }
            }
            ledger.mark_synced();
        }

        ledger.check_and_remove(&env);
        ledger.expire_source_requests(env.now);
        ledger.clean_and_remove(&env, true);

        let sweep = ledger.sweep_immature(&env);
        for broadcast in &sweep.promoted {
            let hash = broadcast.hash();
            self.network.relay(InventoryItem::Proposal(hash));
            self.sync.added_budget_item(&hash);
        }
        tracing::debug!(
            component = COMPONENT,
            height,
            proposals = ledger.proposal_count(),
            promoted = sweep.promoted.len(),
            dropped = sweep.dropped,
            still_immature = sweep.still_immature,
            "budget maintenance"
        );
        true
    }

    fn roll_full_resync(&self) -> bool {
        match self.config.full_resync_window {
            0 => false,
            window => rand::thread_rng().gen_range(0..window) == 0,
        }
    }

    // === PERSISTENCE ===

    /// Load `budget.dat` into the ledger.
    ///
    /// On failure the ledger is left empty. On success proposals are
    /// revalidated against the current chain.
    pub fn load_budgets(&self) -> GovernanceResult<usize> {
        let snapshot = match self.store.read(false) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                pg_telemetry::log_event!(warn, COMPONENT, "failed to load budget file", path = %self.store.path().display(), error = %e);
                self.ledger.lock().clear();
                return Err(e.into());
            }
        };

        let env = self.env();
        let mut ledger = self.ledger.lock();
        ledger.restore(snapshot);
        ledger.check_and_remove(&env);
        let count = ledger.proposal_count();
        pg_telemetry::log_event!(info, COMPONENT, "budget file loaded", proposals = count);
        Ok(count)
    }

    /// Write the ledger to `budget.dat`.
    ///
    /// An existing file is read first. A missing file or one with a valid
    /// header but unreadable body is recreated; any other failure leaves the
    /// file alone.
    pub fn dump_budgets(&self) -> GovernanceResult<()> {
        match self.store.read(true) {
            Ok(_) => {}
            Err(PersistenceError::FileError { .. }) => {
                pg_telemetry::log_event!(info, COMPONENT, "missing budget file, will try to recreate", path = %self.store.path().display());
            }
            Err(PersistenceError::IncorrectFormat(reason)) => {
                pg_telemetry::log_event!(warn, COMPONENT, "budget file magic is ok but data has invalid format, will try to recreate", reason = %reason);
            }
            Err(e) => {
                pg_telemetry::log_event!(error, COMPONENT, "budget file format is unknown or invalid, please fix it manually", error = %e);
                return Err(e.into());
            }
        }

        let snapshot = self.ledger.lock().snapshot();
        self.store.write(&snapshot).map_err(|e| {
            pg_telemetry::log_event!(error, COMPONENT, "failed to write budget file", error = %e);
            GovernanceError::from(e)
        })
    }

    // === VOTING ===

    fn local_masternode(&self) -> GovernanceResult<(OutPoint, &SecretKey)> {
        let local = self
            .config
            .local_masternode
            .as_ref()
            .ok_or_else(|| GovernanceError::NotReady("This is not a masternode".to_string()))?;
        Ok((local.collateral, &local.key))
    }

    fn check_voting_window(&self, proposal: &Hash256) -> GovernanceResult<()> {
        let ledger = self.ledger.lock();
        let Some(found) = ledger.find_proposal(proposal) else {
            return Ok(());
        };
        let height = self
            .chain
            .tip()
            .map(|tip| tip.height)
            .ok_or_else(|| GovernanceError::NotReady("Chain tip unavailable".to_string()))?;
        if found.block_start > height || found.block_end < height {
            return Err(GovernanceError::OutsideVotingWindow {
                start: found.block_start,
                end: found.block_end,
                height,
            });
        }
        Ok(())
    }

    /// Sign `vote` with `key` and apply it locally, relaying on success.
    fn cast_signed(&self, mut vote: BudgetVote, key: &SecretKey) -> Result<(), String> {
        vote.signature = self
            .signer
            .sign(&vote.signing_message(), key.as_bytes())
            .map_err(|_| "Failure to sign.".to_string())?;
        self.apply_local_vote(vote)
            .map(|_| ())
            .map_err(|e| format!("Error voting : {e}"))
    }

    fn apply_local_vote(&self, vote: BudgetVote) -> GovernanceResult<Hash256> {
        let hash = vote.hash();
        let env = self.env();
        if !env.vote_signature_valid(&vote, true) {
            return Err(GovernanceError::InvalidSignature(format!("vote {hash}")));
        }
        let mut ledger = self.ledger.lock();
        ledger
            .update_proposal(vote.clone(), VoteOrigin::Local, &env)
            .map_err(GovernanceError::from)?;
        ledger.insert_seen_vote(vote);
        drop(ledger);

        self.network.relay(InventoryItem::Vote(hash));
        pg_telemetry::log_event!(info, COMPONENT, "budget vote cast", vote = %hash);
        Ok(hash)
    }

    /// Vote with one configured key as the masternode registered under it;
    /// `configured` is only compared for diagnostics. `missing` is reported
    /// when the key belongs to no masternode.
    fn vote_with_key(
        &self,
        node: String,
        configured: OutPoint,
        key: &SecretKey,
        proposal: Hash256,
        outcome: VoteOutcome,
        missing: &str,
    ) -> VoteResult {
        let registered = self
            .signer
            .public_key(key.as_bytes())
            .ok()
            .and_then(|pubkey| self.registry.find_by_pubkey(&pubkey));
        let Some(masternode) = registered else {
            return VoteResult::failed(node, missing);
        };
        if masternode.collateral != configured {
            tracing::debug!(
                component = COMPONENT,
                node = %node,
                configured = %configured,
                registered = %masternode.collateral,
                "configured collateral differs from registered masternode"
            );
        }
        let vote = BudgetVote::new(masternode.collateral, proposal, outcome, self.time_source.now());
        match self.cast_signed(vote, key) {
            Ok(()) => VoteResult::success(node),
            Err(error) => VoteResult::failed(node, error),
        }
    }

    fn vote_delete(&self, proposal: Hash256) -> GovernanceResult<VoteReport> {
        let spork_key = self
            .config
            .spork_key
            .as_ref()
            .ok_or_else(|| GovernanceError::NotReady("Spork key required to delete a proposal".to_string()))?;
        let (collateral, _) = self.local_masternode()?;
        let node = "local".to_string();
        let vote = BudgetVote::new(collateral, proposal, VoteOutcome::Delete, self.time_source.now());
        let result = match self.cast_signed(vote, spork_key) {
            Ok(()) => VoteResult::success(node),
            Err(error) => VoteResult::failed(node, error),
        };
        Ok(VoteReport::from_results(vec![result]))
    }
}

impl<C, R, S, N, Y> BudgetApi for GovernanceService<C, R, S, N, Y>
where
    C: ChainOracle,
    R: MasternodeRegistry,
    S: SigningOracle,
    N: PeerNetwork,
    Y: SyncMonitor,
{
    fn prepare_proposal(&self, request: &ProposalRequest) -> GovernanceResult<PreparedProposal> {
        check_lengths(&request.name, &request.url)?;
        validate_url(&request.url)?;

        let tip = self
            .chain
            .tip()
            .ok_or_else(|| GovernanceError::NotReady("Chain tip unavailable".to_string()))?;
        if request.block_start < tip.height {
            return Err(GovernanceError::MalformedInput(format!(
                "Invalid block start - must be at least the current height ({})",
                tip.height
            )));
        }
        if request.block_end <= request.block_start {
            return Err(GovernanceError::MalformedInput(
                "Invalid block end - must be after block start".to_string(),
            ));
        }

        let broadcast = ProposalBroadcast::new(
            request.name.clone(),
            request.url.clone(),
            request.block_start,
            request.block_end,
            Hash256::ZERO,
        );
        let hash = broadcast.hash();
        let commitment_script = commitment_script(&hash);

        if let Some(spork_key) = &self.config.spork_key {
            let signature = self
                .signer
                .sign(&broadcast.signing_message(), spork_key.as_bytes())
                .map_err(GovernanceError::Signing)?;
            return Ok(PreparedProposal {
                hash,
                commitment_script,
                signature: Some(signature),
                message: "Spork key valid, skip to submitbudget.".to_string(),
            });
        }

        Ok(PreparedProposal {
            hash,
            commitment_script,
            signature: None,
            message: format!(
                "Fund the collateral output with at least {} and submit its transaction hash",
                self.params.proposal_fee
            ),
        })
    }

    fn submit_proposal(
        &self,
        request: &ProposalRequest,
        fee_tx_hash: Hash256,
        signature: Option<Vec<u8>>,
    ) -> GovernanceResult<Hash256> {
        check_lengths(&request.name, &request.url)?;
        validate_url(&request.url)?;

        let mut broadcast = ProposalBroadcast::new(
            request.name.clone(),
            request.url.clone(),
            request.block_start,
            request.block_end,
            fee_tx_hash,
        );
        broadcast.signature = signature.unwrap_or_default();
        let hash = broadcast.hash();

        let env = self.env();
        env.admit_broadcast(&mut broadcast)
            .map_err(|source| GovernanceError::InvalidCollateral {
                name: broadcast.name.clone(),
                source,
            })?;

        if !self.sync.is_synced() {
            return Err(GovernanceError::NotReady(
                "Must wait for client to sync with masternode network. Try again in a minute or so."
                    .to_string(),
            ));
        }

        let mut ledger = self.ledger.lock();
        ledger.add_proposal(BudgetProposal::from(broadcast.clone()), &env)?;
        ledger.insert_seen_broadcast(broadcast);
        drop(ledger);

        self.network.relay(InventoryItem::Proposal(hash));
        pg_telemetry::log_proposal_event!(info, COMPONENT, "proposal submitted", hash, name = %request.name);
        Ok(hash)
    }

    fn find_proposal(&self, hash: &Hash256) -> Option<BudgetProposal> {
        self.ledger.lock().find_proposal(hash).cloned()
    }

    fn find_proposal_by_name(&self, name: &str) -> Option<BudgetProposal> {
        self.ledger.lock().find_proposal_by_name(name).cloned()
    }

    fn get_all_proposals(&self) -> Vec<BudgetProposal> {
        let env = self.env();
        self.ledger.lock().get_all_proposals(&env)
    }

    fn get_budget(&self) -> Vec<BudgetProposal> {
        let env = self.env();
        self.ledger.lock().get_budget(&env)
    }

    fn vote(&self, proposal: Hash256, outcome: VoteOutcome, mode: VoteMode) -> GovernanceResult<VoteReport> {
        if outcome == VoteOutcome::Delete {
            if mode != VoteMode::Local {
                return Err(GovernanceError::MalformedInput(
                    "DELETE votes can only be cast with the local key".to_string(),
                ));
            }
            return self.vote_delete(proposal);
        }

        self.check_voting_window(&proposal)?;

        let results = match mode {
            VoteMode::Local => {
                let (collateral, key) = self.local_masternode()?;
                let missing = format!("Failure to find pillar in list : {}", collateral.to_string_short());
                vec![self.vote_with_key("local".to_string(), collateral, key, proposal, outcome, &missing)]
            }
            VoteMode::Many => self
                .config
                .masternodes
                .iter()
                .map(|entry| {
                    self.vote_with_key(
                        entry.alias.clone(),
                        entry.collateral,
                        &entry.key,
                        proposal,
                        outcome,
                        "Can't find pillar by pubkey",
                    )
                })
                .collect(),
            VoteMode::Alias(alias) => {
                let entry = self.config.find_alias(&alias).ok_or_else(|| {
                    GovernanceError::MalformedInput(format!("Unknown masternode alias: {alias}"))
                })?;
                vec![self.vote_with_key(
                    entry.alias.clone(),
                    entry.collateral,
                    &entry.key,
                    proposal,
                    outcome,
                    "Can't find pillar by pubkey",
                )]
            }
        };
        Ok(VoteReport::from_results(results))
    }

    fn submit_raw_vote(&self, vote: BudgetVote) -> GovernanceResult<Hash256> {
        let env = self.env();
        if self.registry.find(&vote.voter).is_none() {
            return Err(GovernanceError::UnknownMasternode(vote.voter.to_string_short()));
        }
        if !env.vote_signature_valid(&vote, true) {
            return Err(GovernanceError::InvalidSignature("Failure to verify signature.".to_string()));
        }
        self.apply_local_vote(vote)
    }

    fn get_votes(&self, proposal: &Hash256) -> GovernanceResult<Vec<VoteInfo>> {
        let ledger = self.ledger.lock();
        let votes = ledger
            .get_votes(proposal)
            .ok_or(GovernanceError::UnknownProposal(*proposal))?;
        Ok(votes.values().map(VoteInfo::from).collect())
    }

    fn proposal_info(&self, name: Option<&str>) -> Vec<ProposalInfo> {
        let env = self.env();
        let proposals = match name {
            Some(name) => self.find_proposal_by_name(name).into_iter().collect(),
            None => self.get_all_proposals(),
        };
        let adjusted_now = self.chain.adjusted_time();

        proposals
            .into_iter()
            .map(|proposal| {
                let mut probe = proposal.clone();
                let validity = env.validate_proposal(&mut probe, true);
                ProposalInfo {
                    name: proposal.name.clone(),
                    url: proposal.url.clone(),
                    hash: proposal.hash().to_string(),
                    fee_hash: proposal.fee_tx_hash.to_string(),
                    block_start: proposal.block_start,
                    block_end: proposal.block_end,
                    ratio: proposal.ratio(),
                    yeas: proposal.yeas(),
                    nays: proposal.nays(),
                    abstains: proposal.abstains(),
                    is_established: proposal
                        .is_established(adjusted_now, self.params.establishment_delay_secs),
                    is_valid: validity.is_ok(),
                    is_valid_reason: validity.err().map(|e| e.to_string()).unwrap_or_default(),
                    f_valid: proposal.valid,
                }
            })
            .collect()
    }

    fn next_superblock(&self) -> GovernanceResult<i64> {
        let tip = self
            .chain
            .tip()
            .ok_or_else(|| GovernanceError::NotReady("Chain tip unavailable".to_string()))?;
        Ok(self.params.next_superblock(tip.height))
    }

    fn check_budgets(&self) {
        let env = self.env();
        self.ledger.lock().check_and_remove(&env);
    }

    fn get_inventory_item(&self, item: &InventoryItem) -> Option<InventoryPayload> {
        self.ledger.lock().inventory_payload(item)
    }
}
