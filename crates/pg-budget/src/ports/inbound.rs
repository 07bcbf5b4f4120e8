//! Driving ports (inbound API).
//!
//! What the RPC layer and the node's message loop call into.

use crate::domain::{BudgetProposal, BudgetVote, GovernanceResult, Hash256, VoteOutcome};
use crate::events::{InventoryItem, InventoryPayload};
use serde::Serialize;

/// Proposal fields supplied by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    pub name: String,
    pub url: String,
    pub block_start: i64,
    pub block_end: i64,
}

/// Result of preparing a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProposal {
    pub hash: Hash256,
    /// Output script the collateral transaction must pay the fee to.
    pub commitment_script: Vec<u8>,
    /// Spork-key signature, present when the node holds the spork key.
    pub signature: Option<Vec<u8>>,
    pub message: String,
}

/// Which keys cast a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteMode {
    /// The node's own masternode key.
    Local,
    /// Every configured masternode entry.
    Many,
    /// The configured entry with this alias.
    Alias(String),
}

/// Outcome for one masternode key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteResult {
    pub node: String,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VoteResult {
    pub fn success(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            result: "success".to_string(),
            error: None,
        }
    }

    pub fn failed(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            result: "failed".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a vote command across all keys it used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReport {
    pub overall: String,
    pub detail: Vec<VoteResult>,
}

impl VoteReport {
    pub fn from_results(detail: Vec<VoteResult>) -> Self {
        let succeeded = detail.iter().filter(|r| r.is_success()).count();
        let failed = detail.len() - succeeded;
        Self {
            overall: format!(
                "Voted successfully {} time(s) and failed {} time(s).",
                succeeded, failed
            ),
            detail,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.detail.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.detail.len() - self.succeeded()
    }
}

/// One vote as reported to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteInfo {
    #[serde(rename = "mnId")]
    pub voter: String,
    #[serde(rename = "nHash")]
    pub hash: String,
    #[serde(rename = "Vote")]
    pub outcome: String,
    #[serde(rename = "nTime")]
    pub time: i64,
    #[serde(rename = "fValid")]
    pub valid: bool,
}

impl From<&BudgetVote> for VoteInfo {
    fn from(vote: &BudgetVote) -> Self {
        Self {
            voter: vote.voter.to_string_short(),
            hash: vote.hash().to_string(),
            outcome: vote.outcome.as_str().to_string(),
            time: vote.time,
            valid: vote.valid,
        }
    }
}

/// Proposal summary record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "FeeHash")]
    pub fee_hash: String,
    #[serde(rename = "BlockStart")]
    pub block_start: i64,
    #[serde(rename = "BlockEnd")]
    pub block_end: i64,
    #[serde(rename = "Ratio")]
    pub ratio: f64,
    #[serde(rename = "Yeas")]
    pub yeas: i64,
    #[serde(rename = "Nays")]
    pub nays: i64,
    #[serde(rename = "Abstains")]
    pub abstains: i64,
    #[serde(rename = "IsEstablished")]
    pub is_established: bool,
    #[serde(rename = "IsValid")]
    pub is_valid: bool,
    #[serde(rename = "IsValidReason")]
    pub is_valid_reason: String,
    #[serde(rename = "fValid")]
    pub f_valid: bool,
}

/// Budget operations exposed to RPC.
pub trait BudgetApi: Send + Sync {
    /// Check a new proposal and return what is needed to fund it.
    fn prepare_proposal(&self, request: &ProposalRequest) -> GovernanceResult<PreparedProposal>;

    /// Broadcast a funded (or spork-signed) proposal.
    fn submit_proposal(
        &self,
        request: &ProposalRequest,
        fee_tx_hash: Hash256,
        signature: Option<Vec<u8>>,
    ) -> GovernanceResult<Hash256>;

    fn find_proposal(&self, hash: &Hash256) -> Option<BudgetProposal>;

    fn find_proposal_by_name(&self, name: &str) -> Option<BudgetProposal>;

    fn get_all_proposals(&self) -> Vec<BudgetProposal>;

    /// Funded proposals at the current tip, ranked.
    fn get_budget(&self) -> Vec<BudgetProposal>;

    fn vote(&self, proposal: Hash256, outcome: VoteOutcome, mode: VoteMode) -> GovernanceResult<VoteReport>;

    /// Relay a vote signed elsewhere.
    fn submit_raw_vote(&self, vote: BudgetVote) -> GovernanceResult<Hash256>;

    fn get_votes(&self, proposal: &Hash256) -> GovernanceResult<Vec<VoteInfo>>;

    /// Info records for every proposal, or the named one.
    fn proposal_info(&self, name: Option<&str>) -> Vec<ProposalInfo>;

    fn next_superblock(&self) -> GovernanceResult<i64>;

    /// Run the revalidation sweep now.
    fn check_budgets(&self);

    fn get_inventory_item(&self, item: &InventoryItem) -> Option<InventoryPayload>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_report_summary() {
        let report = VoteReport::from_results(vec![
            VoteResult::success("mn1"),
            VoteResult::failed("mn2", "Can't find pillar by pubkey"),
            VoteResult::success("mn3"),
        ]);
        assert_eq!(
            report.overall,
            "Voted successfully 2 time(s) and failed 1 time(s)."
        );
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_vote_info_field_names() {
        let info = VoteInfo {
            voter: "ab-0".to_string(),
            hash: "cd".to_string(),
            outcome: "YES".to_string(),
            time: 1,
            valid: true,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["mnId"], "ab-0");
        assert_eq!(json["Vote"], "YES");
        assert_eq!(json["fValid"], true);
    }
}
