//! Signature and validity rules that need the outside world.
//!
//! [`ValidationEnv`] bundles borrowed oracles for the duration of one ledger
//! operation. The ledger never holds on to them.

use super::collateral::{check_collateral, CollateralError};
use super::entities::{BudgetProposal, BudgetVote, ProposalBroadcast};
use super::errors::{GovernanceError, GovernanceResult};
use super::params::{NetworkParams, MAX_PROPOSAL_NAME_LEN, MAX_PROPOSAL_URL_LEN};
use crate::ports::outbound::{ChainOracle, MasternodeRegistry, SigningOracle};

pub struct ValidationEnv<'a> {
    pub chain: &'a dyn ChainOracle,
    pub registry: &'a dyn MasternodeRegistry,
    pub signer: &'a dyn SigningOracle,
    pub params: &'a NetworkParams,
    /// Local clock, unix seconds.
    pub now: i64,
}

impl<'a> ValidationEnv<'a> {
    /// Spork-key signature over the proposal hash.
    pub fn spork_signature_valid(&self, signature: &[u8], message: &[u8]) -> bool {
        !signature.is_empty()
            && self
                .signer
                .verify(&self.signer.spork_pubkey(), signature, message)
    }

    pub fn proposal_signature_valid(&self, proposal: &BudgetProposal) -> bool {
        self.spork_signature_valid(&proposal.signature, &proposal.signing_message())
    }

    pub fn broadcast_signature_valid(&self, broadcast: &ProposalBroadcast) -> bool {
        self.spork_signature_valid(&broadcast.signature, &broadcast.signing_message())
    }

    /// Whether `vote` comes from a qualifying masternode and, when
    /// `check_signature` is set, carries a valid signature.
    ///
    /// DELETE votes are checked against the spork key only.
    pub fn vote_signature_valid(&self, vote: &BudgetVote, check_signature: bool) -> bool {
        if vote.is_delete() {
            return self.spork_signature_valid(&vote.signature, &vote.signing_message());
        }

        let Some(masternode) = self.registry.find(&vote.voter) else {
            tracing::trace!(voter = %vote.voter, "vote from unknown masternode");
            return false;
        };
        if !self.registry.is_pillar(&masternode.collateral) {
            return false;
        }
        if !check_signature {
            return true;
        }
        !vote.signature.is_empty()
            && self
                .signer
                .verify(&masternode.pubkey, &vote.signature, &vote.signing_message())
    }

    /// Admission rule for a broadcast: spork signature or mature collateral.
    ///
    /// On the collateral path the broadcast time is replaced by the
    /// collateral block time.
    pub fn admit_broadcast(&self, broadcast: &mut ProposalBroadcast) -> Result<(), CollateralError> {
        if self.broadcast_signature_valid(broadcast) {
            return Ok(());
        }
        let receipt = check_collateral(
            self.chain,
            self.params,
            &broadcast.fee_tx_hash,
            &broadcast.hash(),
        )?;
        if let Some(time) = receipt.block_time {
            broadcast.time = time;
        }
        Ok(())
    }

    /// Structural and (optionally) collateral validity of a proposal.
    pub fn validate_proposal(
        &self,
        proposal: &mut BudgetProposal,
        check_collateral_tx: bool,
    ) -> GovernanceResult<()> {
        if proposal.is_actively_removed(self.registry.count_enabled()) {
            return Err(GovernanceError::ActiveRemoval {
                name: proposal.name.clone(),
            });
        }
        if proposal.block_start < 0 {
            return Err(GovernanceError::MalformedInput("Invalid Proposal".to_string()));
        }
        if proposal.block_end < proposal.block_start {
            return Err(GovernanceError::MalformedInput(format!(
                "Proposal {}: Invalid nBlockEnd (end before start)",
                proposal.name
            )));
        }
        check_lengths(&proposal.name, &proposal.url)?;

        if check_collateral_tx && !self.proposal_signature_valid(proposal) {
            let receipt = check_collateral(
                self.chain,
                self.params,
                &proposal.fee_tx_hash,
                &proposal.hash(),
            )
            .map_err(|source| GovernanceError::InvalidCollateral {
                name: proposal.name.clone(),
                source,
            })?;
            if let Some(time) = receipt.block_time {
                proposal.time = time;
            }
        }
        Ok(())
    }

    /// [`validate_proposal`](Self::validate_proposal) for a broadcast, which has no votes.
    pub fn validate_broadcast(
        &self,
        broadcast: &mut ProposalBroadcast,
        check_collateral_tx: bool,
    ) -> GovernanceResult<()> {
        let mut proposal = BudgetProposal::from(broadcast.clone());
        self.validate_proposal(&mut proposal, check_collateral_tx)?;
        broadcast.time = proposal.time;
        Ok(())
    }
}

pub fn check_lengths(name: &str, url: &str) -> GovernanceResult<()> {
    if name.len() > MAX_PROPOSAL_NAME_LEN {
        return Err(GovernanceError::MalformedInput(format!(
            "Invalid proposal name, limit of {} characters.",
            MAX_PROPOSAL_NAME_LEN
        )));
    }
    if url.len() > MAX_PROPOSAL_URL_LEN {
        return Err(GovernanceError::MalformedInput(format!(
            "Invalid URL length, limit of {} characters.",
            MAX_PROPOSAL_URL_LEN
        )));
    }
    Ok(())
}

/// Full URL check applied to locally prepared proposals.
pub fn validate_url(url: &str) -> GovernanceResult<()> {
    if url.is_empty() || url.len() > MAX_PROPOSAL_URL_LEN {
        return Err(GovernanceError::MalformedInput(format!(
            "Invalid URL length, limit of {} characters.",
            MAX_PROPOSAL_URL_LEN
        )));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            GovernanceError::MalformedInput("Invalid URL, must start with http:// or https://".to_string())
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(GovernanceError::MalformedInput("Invalid URL, missing host".to_string()));
    }
    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(GovernanceError::MalformedInput(
            "Invalid URL, contains whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.org/rm").is_ok());
        assert!(validate_url("http://example.org").is_ok());
        assert!(validate_url("ftp://example.org").is_err());
        assert!(validate_url("https://").is_err());
        assert!(validate_url("https://exa mple.org").is_err());
        assert!(validate_url(&format!("https://{}", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_check_lengths() {
        assert!(check_lengths(&"n".repeat(60), "https://x.org").is_ok());
        assert!(check_lengths(&"n".repeat(61), "https://x.org").is_err());
        assert!(check_lengths("n", &"u".repeat(251)).is_err());
    }
}
