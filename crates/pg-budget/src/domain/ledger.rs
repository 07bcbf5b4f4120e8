//! # Budget Ledger
//!
//! The authoritative set of proposals plus the caches that make gossip safe:
//!
//! | Map | Key | Purpose |
//! |-----|-----|---------|
//! | `proposals` | proposal hash | active proposals with their votes |
//! | `seen_broadcasts` | proposal hash | replay suppression, sync source |
//! | `seen_votes` | vote hash | replay suppression |
//! | `orphan_votes` | proposal hash | votes that arrived before their proposal |
//! | `immature` | (queue) | broadcasts waiting for collateral depth |
//! | `asked_for_source` | proposal hash | throttles "send me that proposal" requests |
//!
//! Every entry in `proposals` has a matching entry in `seen_broadcasts`.
//! Orphan votes only reference hashes absent from `proposals`.
//!
//! The ledger is plain data. Callers serialize access and lend it the oracles
//! it needs through [`ValidationEnv`].

use super::entities::{
    BudgetProposal, BudgetVote, FundingWindow, OutPoint, ProposalBroadcast, VoteUpdate,
};
use super::errors::{GovernanceError, GovernanceResult};
use super::hashing::Hash256;
use super::params::SOURCE_REQUEST_TTL_SECS;
use super::persistence::LedgerSnapshot;
use super::validation::ValidationEnv;
use crate::events::{InventoryItem, InventoryPayload};
use crate::ports::outbound::PeerId;
use std::cmp::Ordering;
use std::collections::BTreeMap;

const COMPONENT: &str = "ledger";

/// Capacity limits for the unauthenticated holding areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLimits {
    pub max_orphan_votes: usize,
    pub max_immature: usize,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_orphan_votes: 10_000,
            max_immature: 1_000,
        }
    }
}

/// Where a vote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOrigin {
    /// Local RPC, orphan sweep or raw submission.
    Local,
    /// Gossip from `peer`. `masternodes_synced` is our own sync state.
    Peer {
        peer: PeerId,
        masternodes_synced: bool,
    },
}

/// What a successful vote did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDisposition {
    Merged(VoteUpdate),
    /// Authorized DELETE removed the proposal.
    ProposalDeleted,
}

/// Vote rejected because its proposal is unknown.
///
/// `request_source` is set when the caller should ask the peer for the
/// proposal; it is set at most once per proposal until the request expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownProposal {
    pub proposal: Hash256,
    pub request_source: bool,
}

/// Result of one immature-queue sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImmatureSweep {
    /// Broadcasts promoted into the proposal map; relay these.
    pub promoted: Vec<ProposalBroadcast>,
    pub dropped: usize,
    pub still_immature: usize,
}

/// Funding order: net support descending, then fee hash descending.
pub fn compare_for_funding(a: &BudgetProposal, b: &BudgetProposal) -> Ordering {
    b.net_yeas()
        .cmp(&a.net_yeas())
        .then_with(|| b.fee_tx_hash.cmp(&a.fee_tx_hash))
}

#[derive(Debug, Default)]
pub struct BudgetLedger {
    proposals: BTreeMap<Hash256, BudgetProposal>,
    seen_broadcasts: BTreeMap<Hash256, ProposalBroadcast>,
    seen_votes: BTreeMap<Hash256, BudgetVote>,
    orphan_votes: BTreeMap<Hash256, BudgetVote>,
    immature: Vec<ProposalBroadcast>,
    asked_for_source: BTreeMap<Hash256, i64>,
    limits: LedgerLimits,
}

impl BudgetLedger {
    pub fn new(limits: LedgerLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    /// Validate and insert a proposal. Returns its hash.
    pub fn add_proposal(
        &mut self,
        mut proposal: BudgetProposal,
        env: &ValidationEnv<'_>,
    ) -> GovernanceResult<Hash256> {
        if let Err(e) = env.validate_proposal(&mut proposal, true) {
            tracing::debug!(component = COMPONENT, error = %e, "invalid budget proposal");
            return Err(e);
        }

        let hash = proposal.hash();
        if self.proposals.contains_key(&hash) {
            return Err(GovernanceError::ProposalExists(hash));
        }

        self.seen_broadcasts
            .entry(hash)
            .or_insert_with(|| proposal.to_broadcast());
        pg_telemetry::log_proposal_event!(
            debug,
            COMPONENT,
            "proposal added",
            hash,
            name = %proposal.name
        );
        proposal.valid = true;
        self.proposals.insert(hash, proposal);
        Ok(hash)
    }

    pub fn find_proposal(&self, hash: &Hash256) -> Option<&BudgetProposal> {
        self.proposals.get(hash)
    }

    pub fn contains_proposal(&self, hash: &Hash256) -> bool {
        self.proposals.contains_key(hash)
    }

    /// The proposal with this name and the most yes votes.
    ///
    /// On equal yes counts the lowest hash wins.
    pub fn find_proposal_by_name(&self, name: &str) -> Option<&BudgetProposal> {
        let mut best: Option<&BudgetProposal> = None;
        for proposal in self.proposals.values().filter(|p| p.name == name) {
            if best.map_or(true, |b| proposal.yeas() > b.yeas()) {
                best = Some(proposal);
            }
        }
        best
    }

    /// Every proposal after refreshing vote validity against the masternode list.
    pub fn get_all_proposals(&mut self, env: &ValidationEnv<'_>) -> Vec<BudgetProposal> {
        self.clean_and_remove(env, false);
        self.proposals.values().cloned().collect()
    }

    /// The funded set at the current tip, in funding order.
    pub fn get_budget(&mut self, env: &ValidationEnv<'_>) -> Vec<BudgetProposal> {
        self.clean_and_remove(env, false);

        let mut ranked: Vec<&BudgetProposal> = self.proposals.values().collect();
        ranked.sort_by(|a, b| compare_for_funding(a, b));

        let Some(tip) = env.chain.tip() else {
            return Vec::new();
        };
        let window = FundingWindow {
            start: tip.height,
            end: tip.height,
            enabled_count: env.registry.count_enabled(),
        };
        let adjusted_now = env.chain.adjusted_time();

        ranked
            .into_iter()
            .filter(|proposal| {
                let passing = proposal.is_passing(
                    Some(tip.height),
                    &window,
                    adjusted_now,
                    env.params.establishment_delay_secs,
                );
                tracing::trace!(
                    component = COMPONENT,
                    proposal = %proposal.hash(),
                    passing,
                    yeas = proposal.yeas(),
                    nays = proposal.nays(),
                    "budget candidate"
                );
                passing
            })
            .cloned()
            .collect()
    }

    /// Revalidate every proposal, dropping the ones that fail.
    pub fn check_and_remove(&mut self, env: &ValidationEnv<'_>) {
        let before = self.proposals.len();
        let proposals = std::mem::take(&mut self.proposals);
        self.proposals = proposals
            .into_iter()
            .filter_map(|(hash, mut proposal)| match env.validate_proposal(&mut proposal, true) {
                Ok(()) => {
                    proposal.valid = true;
                    Some((hash, proposal))
                }
                Err(e) => {
                    pg_telemetry::log_proposal_event!(
                        debug,
                        COMPONENT,
                        "dropping invalid proposal",
                        hash,
                        error = %e
                    );
                    None
                }
            })
            .collect();
        tracing::debug!(
            component = COMPONENT,
            before,
            after = self.proposals.len(),
            "proposal cleanup"
        );
    }

    /// Refresh every stored vote's `valid` flag.
    ///
    /// Votes from masternodes that no longer resolve or qualify are marked
    /// invalid; with `check_signatures` the signatures are verified too.
    pub fn clean_and_remove(&mut self, env: &ValidationEnv<'_>, check_signatures: bool) {
        for proposal in self.proposals.values_mut() {
            for vote in proposal.votes.values_mut() {
                vote.valid = env.vote_signature_valid(vote, check_signatures);
            }
        }
    }

    // ------------------------------------------------------------------
    // Votes
    // ------------------------------------------------------------------

    /// Apply a vote to its proposal.
    ///
    /// A DELETE vote with a valid spork signature removes the proposal. A vote
    /// for an unknown proposal from a synced peer is kept as an orphan.
    pub fn update_proposal(
        &mut self,
        vote: BudgetVote,
        origin: VoteOrigin,
        env: &ValidationEnv<'_>,
    ) -> Result<VoteDisposition, VoteRejection> {
        let hash = vote.proposal_hash;
        if !self.proposals.contains_key(&hash) {
            let request_source = match origin {
                VoteOrigin::Peer {
                    masternodes_synced: true,
                    ..
                } => self.record_orphan(vote, env.now),
                _ => false,
            };
            return Err(VoteRejection::Unknown(UnknownProposal {
                proposal: hash,
                request_source,
            }));
        }

        if vote.is_delete() {
            if !env.vote_signature_valid(&vote, true) {
                return Err(VoteRejection::Invalid(GovernanceError::InvalidSignature(
                    "DELETE vote is not signed by the spork key".to_string(),
                )));
            }
            self.proposals.remove(&hash);
            pg_telemetry::log_proposal_event!(info, COMPONENT, "proposal deleted by authority", hash);
            return Ok(VoteDisposition::ProposalDeleted);
        }

        let proposal = self
            .proposals
            .get_mut(&hash)
            .ok_or(VoteRejection::Unknown(UnknownProposal {
                proposal: hash,
                request_source: false,
            }))?;
        proposal
            .add_or_update_vote(vote, env.now)
            .map(VoteDisposition::Merged)
            .map_err(VoteRejection::Invalid)
    }

    /// Store an orphan. Returns true when the source proposal should be requested.
    fn record_orphan(&mut self, vote: BudgetVote, now: i64) -> bool {
        let hash = vote.proposal_hash;
        if self.orphan_votes.len() < self.limits.max_orphan_votes
            || self.orphan_votes.contains_key(&hash)
        {
            self.orphan_votes.insert(hash, vote);
        } else {
            tracing::debug!(component = COMPONENT, proposal = %hash, "orphan vote store full");
        }

        if self.asked_for_source.contains_key(&hash) {
            return false;
        }
        self.asked_for_source.insert(hash, now);
        pg_telemetry::log_proposal_event!(debug, COMPONENT, "unknown proposal, asking for source", hash);
        true
    }

    /// Retry every orphan vote; the ones that now apply leave the orphan set.
    pub fn check_orphan_votes(&mut self, env: &ValidationEnv<'_>) -> usize {
        let orphans = std::mem::take(&mut self.orphan_votes);
        let mut applied = 0;
        for (hash, vote) in orphans {
            match self.update_proposal(vote.clone(), VoteOrigin::Local, env) {
                Ok(_) => {
                    applied += 1;
                    pg_telemetry::log_proposal_event!(debug, COMPONENT, "orphan vote activated", hash);
                }
                Err(_) => {
                    self.orphan_votes.insert(hash, vote);
                }
            }
        }
        applied
    }

    pub fn get_votes(&self, proposal: &Hash256) -> Option<&BTreeMap<OutPoint, BudgetVote>> {
        self.proposals.get(proposal).map(|p| &p.votes)
    }

    // ------------------------------------------------------------------
    // Seen caches and inventory
    // ------------------------------------------------------------------

    pub fn is_broadcast_seen(&self, hash: &Hash256) -> bool {
        self.seen_broadcasts.contains_key(hash)
    }

    pub fn insert_seen_broadcast(&mut self, broadcast: ProposalBroadcast) {
        self.seen_broadcasts.insert(broadcast.hash(), broadcast);
    }

    pub fn is_vote_seen(&self, hash: &Hash256) -> bool {
        self.seen_votes.contains_key(hash)
    }

    pub fn insert_seen_vote(&mut self, vote: BudgetVote) {
        self.seen_votes.insert(vote.hash(), vote);
    }

    /// Forget seen votes and broadcasts, forcing them to be accepted again.
    ///
    /// Broadcasts of active proposals are re-seeded so every proposal keeps
    /// its seen entry.
    pub fn clear_seen(&mut self) {
        self.seen_votes.clear();
        self.seen_broadcasts = self
            .proposals
            .iter()
            .map(|(hash, proposal)| (*hash, proposal.to_broadcast()))
            .collect();
    }

    /// Data for an inventory hash we announced.
    pub fn inventory_payload(&self, item: &InventoryItem) -> Option<InventoryPayload> {
        match item {
            InventoryItem::Proposal(hash) => self
                .seen_broadcasts
                .get(hash)
                .cloned()
                .map(InventoryPayload::Proposal),
            InventoryItem::Vote(hash) => self
                .seen_votes
                .get(hash)
                .or_else(|| self.stored_vote(hash))
                .cloned()
                .map(InventoryPayload::Vote),
        }
    }

    /// A vote held by an active proposal. Covers votes announced after
    /// `clear_seen` emptied the seen cache.
    fn stored_vote(&self, hash: &Hash256) -> Option<&BudgetVote> {
        self.proposals
            .values()
            .flat_map(|proposal| proposal.votes.values())
            .find(|vote| vote.hash() == *hash)
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Inventory to send a peer: each valid proposal matching `filter`
    /// followed by its valid votes. `partial` skips votes already synced.
    pub fn sync_items(&self, filter: &Hash256, partial: bool) -> Vec<InventoryItem> {
        let mut items = Vec::new();
        for hash in self.seen_broadcasts.keys() {
            if !filter.is_zero() && hash != filter {
                continue;
            }
            let Some(proposal) = self.proposals.get(hash) else {
                continue;
            };
            if !proposal.valid {
                continue;
            }
            items.push(InventoryItem::Proposal(*hash));
            items.extend(
                proposal
                    .votes
                    .values()
                    .filter(|vote| vote.valid && (!partial || !vote.synced))
                    .map(|vote| InventoryItem::Vote(vote.hash())),
            );
        }
        items
    }

    /// Mark every vote as not yet synced.
    pub fn reset_sync(&mut self) {
        for proposal in self.proposals.values_mut().filter(|p| p.valid) {
            for vote in proposal.votes.values_mut() {
                vote.synced = false;
            }
        }
    }

    /// Mark every valid vote as synced.
    pub fn mark_synced(&mut self) {
        for proposal in self.proposals.values_mut().filter(|p| p.valid) {
            for vote in proposal.votes.values_mut().filter(|v| v.valid) {
                vote.synced = true;
            }
        }
    }

    // ------------------------------------------------------------------
    // Immature queue and source requests
    // ------------------------------------------------------------------

    /// Queue a broadcast whose collateral is not deep enough yet.
    pub fn queue_immature(&mut self, broadcast: ProposalBroadcast) -> bool {
        let hash = broadcast.hash();
        if self.immature.iter().any(|b| b.hash() == hash) {
            return false;
        }
        if self.immature.len() >= self.limits.max_immature {
            tracing::debug!(component = COMPONENT, proposal = %hash, "immature queue full");
            return false;
        }
        self.immature.push(broadcast);
        true
    }

    /// Re-check every queued broadcast once.
    ///
    /// Entries leave the queue when promoted or rejected; only those whose
    /// collateral is still immature stay.
    pub fn sweep_immature(&mut self, env: &ValidationEnv<'_>) -> ImmatureSweep {
        let mut sweep = ImmatureSweep::default();
        let queue = std::mem::take(&mut self.immature);
        for mut broadcast in queue {
            match env.admit_broadcast(&mut broadcast) {
                Err(e) if e.is_immature() => {
                    sweep.still_immature += 1;
                    self.immature.push(broadcast);
                }
                Err(e) => {
                    sweep.dropped += 1;
                    tracing::debug!(component = COMPONENT, proposal = %broadcast.hash(), error = %e, "immature proposal rejected");
                }
                Ok(()) => {
                    let proposal = BudgetProposal::from(broadcast.clone());
                    match self.add_proposal(proposal, env) {
                        Ok(hash) => {
                            self.seen_broadcasts.insert(hash, broadcast.clone());
                            pg_telemetry::log_proposal_event!(info, COMPONENT, "immature proposal promoted", hash);
                            sweep.promoted.push(broadcast);
                        }
                        Err(e) => {
                            sweep.dropped += 1;
                            tracing::debug!(component = COMPONENT, error = %e, "immature proposal not added");
                        }
                    }
                }
            }
        }
        sweep
    }

    /// Drop "asked for source" records older than a day.
    pub fn expire_source_requests(&mut self, now: i64) {
        self.asked_for_source
            .retain(|_, asked_at| *asked_at > now - SOURCE_REQUEST_TTL_SECS);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            seen_broadcasts: self.seen_broadcasts.clone(),
            seen_votes: self.seen_votes.clone(),
            orphan_votes: self.orphan_votes.clone(),
            proposals: self.proposals.clone(),
        }
    }

    /// Replace the persisted maps with `snapshot`.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.seen_broadcasts = snapshot.seen_broadcasts;
        self.seen_votes = snapshot.seen_votes;
        self.orphan_votes = snapshot.orphan_votes;
        self.proposals = snapshot.proposals;
        for (hash, proposal) in &self.proposals {
            self.seen_broadcasts
                .entry(*hash)
                .or_insert_with(|| proposal.to_broadcast());
        }
        self.immature.clear();
        self.asked_for_source.clear();
    }

    pub fn clear(&mut self) {
        let limits = self.limits;
        *self = Self::new(limits);
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn proposals(&self) -> impl Iterator<Item = &BudgetProposal> {
        self.proposals.values()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn orphan_votes(&self) -> &BTreeMap<Hash256, BudgetVote> {
        &self.orphan_votes
    }

    pub fn immature(&self) -> &[ProposalBroadcast] {
        &self.immature
    }

    pub fn seen_broadcast_count(&self) -> usize {
        self.seen_broadcasts.len()
    }

    pub fn seen_vote_count(&self) -> usize {
        self.seen_votes.len()
    }

    pub fn asked_for_source(&self, hash: &Hash256) -> Option<i64> {
        self.asked_for_source.get(hash).copied()
    }
}

/// Why [`BudgetLedger::update_proposal`] did not apply a vote.
#[derive(Debug)]
pub enum VoteRejection {
    Unknown(UnknownProposal),
    Invalid(GovernanceError),
}

impl From<VoteRejection> for GovernanceError {
    fn from(rejection: VoteRejection) -> Self {
        match rejection {
            VoteRejection::Unknown(unknown) => GovernanceError::UnknownProposal(unknown.proposal),
            VoteRejection::Invalid(e) => e,
        }
    }
}

impl std::fmt::Display for VoteRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteRejection::Unknown(unknown) => {
                write!(f, "Proposal not found! ({})", unknown.proposal)
            }
            VoteRejection::Invalid(e) => write!(f, "{}", e),
        }
    }
}
