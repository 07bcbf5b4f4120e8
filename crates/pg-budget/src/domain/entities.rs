//! Votes, proposals and the proposal broadcast.

use super::errors::{GovernanceError, GovernanceResult};
use super::hashing::{Hash256, HashWriter};
use super::params::{MAX_VOTE_FUTURE_DRIFT_SECS, VOTE_UPDATE_MIN_SECS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

fn default_valid() -> bool {
    true
}

/// Reference to a transaction output. Identifies a masternode by its collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }

    /// `txid-index`, the compact form used in logs and reports.
    pub fn to_string_short(&self) -> String {
        format!("{}-{}", self.txid, self.index)
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_short())
    }
}

impl FromStr for OutPoint {
    type Err = GovernanceError;

    /// Parses the `txid-index` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GovernanceError::MalformedInput(format!("Invalid outpoint: {s}"));
        let (txid, index) = s.rsplit_once('-').ok_or_else(malformed)?;
        let txid = txid.parse::<Hash256>().map_err(|_| malformed())?;
        let index = index.parse::<u32>().map_err(|_| malformed())?;
        Ok(Self::new(txid, index))
    }
}

/// Ballot value. The discriminants are part of the vote hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOutcome {
    Abstain = 0,
    Yes = 1,
    No = 2,
    /// Authority override: removes the proposal when signed by the spork key.
    Delete = 3,
}

impl VoteOutcome {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoteOutcome::Abstain => "ABSTAIN",
            VoteOutcome::Yes => "YES",
            VoteOutcome::No => "NO",
            VoteOutcome::Delete => "DELETE",
        }
    }
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteOutcome {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" => Ok(VoteOutcome::Yes),
            "no" => Ok(VoteOutcome::No),
            "abstain" => Ok(VoteOutcome::Abstain),
            "delete" => Ok(VoteOutcome::Delete),
            _ => Err(GovernanceError::MalformedInput(
                "You can only vote 'yes', 'no' or 'delete'".to_string(),
            )),
        }
    }
}

/// A masternode's signed opinion on one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetVote {
    pub voter: OutPoint,
    pub proposal_hash: Hash256,
    pub outcome: VoteOutcome,
    pub time: i64,
    pub signature: Vec<u8>,
    /// Cleared when the voter stops resolving to a qualifying masternode.
    #[serde(skip_serializing, skip_deserializing, default = "default_valid")]
    pub valid: bool,
    /// Set once the vote has been included in a sync pass.
    #[serde(skip)]
    pub synced: bool,
}

impl BudgetVote {
    /// Unsigned vote.
    pub fn new(voter: OutPoint, proposal_hash: Hash256, outcome: VoteOutcome, time: i64) -> Self {
        Self {
            voter,
            proposal_hash,
            outcome,
            time,
            signature: Vec::new(),
            valid: true,
            synced: false,
        }
    }

    /// Content hash over (voter, proposal, outcome, time). Dedup key for the vote.
    pub fn hash(&self) -> Hash256 {
        let mut writer = HashWriter::new();
        writer
            .write_hash(&self.voter.txid)
            .write_u32(self.voter.index)
            .write_hash(&self.proposal_hash)
            .write_u32(self.outcome.as_u32())
            .write_i64(self.time);
        writer.finish()
    }

    pub fn is_delete(&self) -> bool {
        self.outcome == VoteOutcome::Delete
    }

    /// Bytes covered by the vote signature.
    ///
    /// Ordinary votes sign their content hash. DELETE votes are signed by the
    /// spork key and leave the voter out, so one authority signature covers
    /// the removal regardless of which node relays it.
    pub fn signing_message(&self) -> Vec<u8> {
        if self.is_delete() {
            format!("{}{}{}", self.proposal_hash, self.outcome.as_u32(), self.time).into_bytes()
        } else {
            self.hash().as_bytes().to_vec()
        }
    }
}

/// Wire form of a proposal: every proposal field except the votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalBroadcast {
    pub name: String,
    pub url: String,
    pub block_start: i64,
    pub block_end: i64,
    /// Creation time; replaced by the collateral block time once that is known.
    pub time: i64,
    pub fee_tx_hash: Hash256,
    /// Spork-key signature over the proposal hash. Empty when collateral-backed.
    pub signature: Vec<u8>,
}

impl ProposalBroadcast {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        block_start: i64,
        block_end: i64,
        fee_tx_hash: Hash256,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            block_start,
            block_end,
            time: 0,
            fee_tx_hash,
            signature: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash256 {
        proposal_hash(&self.name, &self.url, self.block_start, self.block_end)
    }

    pub fn signing_message(&self) -> Vec<u8> {
        self.hash().to_string().into_bytes()
    }
}

fn proposal_hash(name: &str, url: &str, block_start: i64, block_end: i64) -> Hash256 {
    let mut writer = HashWriter::new();
    writer
        .write_str(name)
        .write_str(url)
        .write_i64(block_start)
        .write_i64(block_end);
    writer.finish()
}

/// Outcome of a successful vote merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteUpdate {
    Inserted,
    Replaced,
}

/// Query window and voting weight used by the funding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingWindow {
    pub start: i64,
    pub end: i64,
    pub enabled_count: i64,
}

/// A spending request and the votes cast on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetProposal {
    pub name: String,
    pub url: String,
    pub block_start: i64,
    pub block_end: i64,
    pub time: i64,
    pub fee_tx_hash: Hash256,
    pub signature: Vec<u8>,
    pub votes: BTreeMap<OutPoint, BudgetVote>,
    /// Result of the last revalidation sweep.
    #[serde(skip_serializing, skip_deserializing, default = "default_valid")]
    pub valid: bool,
}

impl From<ProposalBroadcast> for BudgetProposal {
    fn from(broadcast: ProposalBroadcast) -> Self {
        Self {
            name: broadcast.name,
            url: broadcast.url,
            block_start: broadcast.block_start,
            block_end: broadcast.block_end,
            time: broadcast.time,
            fee_tx_hash: broadcast.fee_tx_hash,
            signature: broadcast.signature,
            votes: BTreeMap::new(),
            valid: true,
        }
    }
}

impl BudgetProposal {
    pub fn hash(&self) -> Hash256 {
        proposal_hash(&self.name, &self.url, self.block_start, self.block_end)
    }

    pub fn to_broadcast(&self) -> ProposalBroadcast {
        ProposalBroadcast {
            name: self.name.clone(),
            url: self.url.clone(),
            block_start: self.block_start,
            block_end: self.block_end,
            time: self.time,
            fee_tx_hash: self.fee_tx_hash,
            signature: self.signature.clone(),
        }
    }

    pub fn signing_message(&self) -> Vec<u8> {
        self.hash().to_string().into_bytes()
    }

    fn count(&self, outcome: VoteOutcome) -> i64 {
        self.votes
            .values()
            .filter(|v| v.valid && v.outcome == outcome)
            .count() as i64
    }

    pub fn yeas(&self) -> i64 {
        self.count(VoteOutcome::Yes)
    }

    pub fn nays(&self) -> i64 {
        self.count(VoteOutcome::No)
    }

    pub fn abstains(&self) -> i64 {
        self.count(VoteOutcome::Abstain)
    }

    /// Net support, the primary ranking key.
    pub fn net_yeas(&self) -> i64 {
        self.yeas() - self.nays()
    }

    /// Percentage of yes among yes/no votes; 0 when nobody has voted either way.
    pub fn ratio(&self) -> f64 {
        let yeas = self.yeas();
        let nays = self.nays();
        if yeas + nays == 0 {
            return 0.0;
        }
        yeas as f64 / (yeas + nays) as f64 * 100.0
    }

    /// Net opposition exceeds a tenth of the enabled masternodes.
    pub fn is_actively_removed(&self, enabled_count: i64) -> bool {
        self.nays() - self.yeas() > enabled_count / 10
    }

    pub fn is_established(&self, adjusted_now: i64, establishment_delay: i64) -> bool {
        self.time < adjusted_now - establishment_delay
    }

    /// Funding rule for one period.
    ///
    /// The proposal's block range must cover the whole window, net support
    /// must exceed a tenth of the enabled masternodes, and the proposal must
    /// be established.
    pub fn is_passing(
        &self,
        tip_height: Option<i64>,
        window: &FundingWindow,
        adjusted_now: i64,
        establishment_delay: i64,
    ) -> bool {
        if !self.valid || tip_height.is_none() {
            return false;
        }
        if self.block_start > window.start || self.block_end < window.end {
            return false;
        }
        if self.yeas() - self.nays() <= window.enabled_count / 10 {
            return false;
        }
        self.is_established(adjusted_now, establishment_delay)
    }

    /// Merge a vote, keeping at most one per voter.
    ///
    /// A replacement must not be older than the stored vote and must come at
    /// least an hour after it. No vote may be stamped more than an hour ahead
    /// of `now`.
    pub fn add_or_update_vote(&mut self, vote: BudgetVote, now: i64) -> GovernanceResult<VoteUpdate> {
        let mut update = VoteUpdate::Inserted;
        if let Some(existing) = self.votes.get(&vote.voter) {
            if existing.time > vote.time {
                return Err(GovernanceError::VoteOlderThanExisting { vote: vote.hash() });
            }
            let elapsed = vote.time.saturating_sub(existing.time);
            if elapsed < VOTE_UPDATE_MIN_SECS {
                return Err(GovernanceError::VoteTooSoon {
                    vote: vote.hash(),
                    elapsed,
                    min: VOTE_UPDATE_MIN_SECS,
                });
            }
            update = VoteUpdate::Replaced;
        }

        let max_time = now + MAX_VOTE_FUTURE_DRIFT_SECS;
        if vote.time > max_time {
            return Err(GovernanceError::VoteTooFarAhead {
                vote: vote.hash(),
                time: vote.time,
                max: max_time,
            });
        }

        tracing::debug!(
            proposal = %self.hash(),
            vote = %vote.hash(),
            update = ?update,
            "vote merged"
        );
        self.votes.insert(vote.voter, vote);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(n: u64) -> OutPoint {
        OutPoint::new(Hash256::from_low_u64(n), 0)
    }

    fn proposal() -> BudgetProposal {
        let mut broadcast = ProposalBroadcast::new(
            "road-map",
            "https://example.org/rm",
            1000,
            2000,
            Hash256::from_low_u64(0xfee),
        );
        broadcast.time = 1_000;
        BudgetProposal::from(broadcast)
    }

    fn cast(p: &mut BudgetProposal, n: u64, outcome: VoteOutcome, time: i64) {
        let vote = BudgetVote::new(voter(n), p.hash(), outcome, time);
        p.add_or_update_vote(vote, time).unwrap();
    }

    #[test]
    fn test_broadcast_conversion_preserves_identity() {
        let p = proposal();
        let b = p.to_broadcast();
        assert_eq!(b.hash(), p.hash());
        let back = BudgetProposal::from(b.clone());
        assert_eq!(back.fee_tx_hash, b.fee_tx_hash);
        assert_eq!(back.name, "road-map");
        assert!(back.votes.is_empty());
    }

    #[test]
    fn test_hash_excludes_fee_and_votes() {
        let mut a = proposal();
        let before = a.hash();
        a.fee_tx_hash = Hash256::from_low_u64(1);
        cast(&mut a, 1, VoteOutcome::Yes, 5_000);
        assert_eq!(a.hash(), before);
        a.block_end += 1;
        assert_ne!(a.hash(), before);
    }

    #[test]
    fn test_ratio_road_map() {
        let mut p = proposal();
        for n in 0..7 {
            cast(&mut p, n, VoteOutcome::Yes, 5_000);
        }
        for n in 7..9 {
            cast(&mut p, n, VoteOutcome::No, 5_000);
        }
        assert_eq!(p.yeas(), 7);
        assert_eq!(p.nays(), 2);
        assert!((p.ratio() - 77.777).abs() < 0.01);
    }

    #[test]
    fn test_ratio_without_votes_is_zero() {
        let mut p = proposal();
        assert_eq!(p.ratio(), 0.0);
        cast(&mut p, 1, VoteOutcome::Abstain, 5_000);
        assert_eq!(p.ratio(), 0.0);
    }

    #[test]
    fn test_invalid_votes_are_not_counted() {
        let mut p = proposal();
        cast(&mut p, 1, VoteOutcome::Yes, 5_000);
        cast(&mut p, 2, VoteOutcome::No, 5_000);
        cast(&mut p, 3, VoteOutcome::Abstain, 5_000);
        p.votes.get_mut(&voter(1)).unwrap().valid = false;
        assert_eq!(p.yeas() + p.nays() + p.abstains(), 2);
        assert_eq!(p.votes.len(), 3);
    }

    #[test]
    fn test_vote_replacement_rules() {
        let mut p = proposal();
        cast(&mut p, 1, VoteOutcome::Yes, 10_000);

        let older = BudgetVote::new(voter(1), p.hash(), VoteOutcome::No, 9_000);
        assert!(matches!(
            p.add_or_update_vote(older, 20_000),
            Err(GovernanceError::VoteOlderThanExisting { .. })
        ));

        let soon = BudgetVote::new(voter(1), p.hash(), VoteOutcome::No, 10_000 + 3_599);
        assert!(matches!(
            p.add_or_update_vote(soon, 20_000),
            Err(GovernanceError::VoteTooSoon { .. })
        ));

        let later = BudgetVote::new(voter(1), p.hash(), VoteOutcome::No, 10_000 + 3_600);
        assert_eq!(
            p.add_or_update_vote(later, 20_000).unwrap(),
            VoteUpdate::Replaced
        );
        assert_eq!(p.votes.len(), 1);
        assert_eq!(p.nays(), 1);
    }

    #[test]
    fn test_replacement_after_extreme_timestamp() {
        let mut p = proposal();
        cast(&mut p, 1, VoteOutcome::No, i64::MIN);

        let vote = BudgetVote::new(voter(1), p.hash(), VoteOutcome::Yes, 1_700_000_000);
        assert_eq!(
            p.add_or_update_vote(vote, 1_700_000_000).unwrap(),
            VoteUpdate::Replaced
        );
        assert_eq!(p.yeas(), 1);
    }

    #[test]
    fn test_future_vote_rejected() {
        let mut p = proposal();
        let vote = BudgetVote::new(voter(1), p.hash(), VoteOutcome::Yes, 10_000 + 3_601);
        assert!(matches!(
            p.add_or_update_vote(vote, 10_000),
            Err(GovernanceError::VoteTooFarAhead { .. })
        ));
        let edge = BudgetVote::new(voter(1), p.hash(), VoteOutcome::Yes, 10_000 + 3_600);
        assert!(p.add_or_update_vote(edge, 10_000).is_ok());
    }

    #[test]
    fn test_active_removal_threshold() {
        let mut p = proposal();
        for n in 0..3 {
            cast(&mut p, n, VoteOutcome::No, 5_000);
        }
        // 3 - 0 > 20 / 10
        assert!(p.is_actively_removed(20));
        assert!(!p.is_actively_removed(30));
    }

    #[test]
    fn test_is_passing_requires_window_containment() {
        let mut p = proposal();
        for n in 0..20 {
            cast(&mut p, n, VoteOutcome::Yes, 5_000);
        }
        let now = 1_000_000;
        let inside = FundingWindow { start: 1500, end: 1500, enabled_count: 20 };
        assert!(p.is_passing(Some(1500), &inside, now, 0));

        let early = FundingWindow { start: 900, end: 1500, enabled_count: 20 };
        assert!(!p.is_passing(Some(1500), &early, now, 0));
        let late = FundingWindow { start: 1500, end: 2001, enabled_count: 20 };
        assert!(!p.is_passing(Some(1500), &late, now, 0));
        assert!(!p.is_passing(None, &inside, now, 0));
    }

    #[test]
    fn test_is_passing_threshold_is_strict() {
        let mut p = proposal();
        cast(&mut p, 1, VoteOutcome::Yes, 5_000);
        cast(&mut p, 2, VoteOutcome::Yes, 5_000);
        let window = FundingWindow { start: 1500, end: 1500, enabled_count: 20 };
        // 2 - 0 <= 20 / 10
        assert!(!p.is_passing(Some(1500), &window, 1_000_000, 0));
        cast(&mut p, 3, VoteOutcome::Yes, 5_000);
        assert!(p.is_passing(Some(1500), &window, 1_000_000, 0));
    }

    #[test]
    fn test_establishment() {
        let p = proposal();
        assert!(!p.is_established(1_000 + 86_400, 86_400));
        assert!(p.is_established(1_001 + 86_400, 86_400));
    }

    #[test]
    fn test_delete_signing_message_is_voter_independent() {
        let h = Hash256::from_low_u64(9);
        let a = BudgetVote::new(voter(1), h, VoteOutcome::Delete, 77);
        let b = BudgetVote::new(voter(2), h, VoteOutcome::Delete, 77);
        assert_eq!(a.signing_message(), b.signing_message());
        assert_ne!(a.hash(), b.hash());

        let c = BudgetVote::new(voter(1), h, VoteOutcome::Yes, 77);
        assert_eq!(c.signing_message(), c.hash().as_bytes().to_vec());
    }

    #[test]
    fn test_vote_outcome_parse() {
        assert_eq!("YES".parse::<VoteOutcome>().unwrap(), VoteOutcome::Yes);
        assert_eq!("delete".parse::<VoteOutcome>().unwrap(), VoteOutcome::Delete);
        assert!("maybe".parse::<VoteOutcome>().is_err());
    }
}
