//! Error types for the governance subsystem.

use super::collateral::CollateralError;
use super::hashing::Hash256;
use super::persistence::PersistenceError;
use thiserror::Error;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad lengths, negative blocks, end before start.
    MalformedInput,
    CollateralInvalid,
    SignatureInvalid,
    /// Already seen, or older than what is stored.
    DuplicateOrReplayed,
    /// Vote too soon after the previous one, or too far in the future.
    RateLimited,
    /// Vote for a proposal we do not know. Recoverable.
    UnknownProposal,
    /// Net opposition crossed the removal threshold.
    ActiveRemoval,
    /// Missing chain tip, masternode list, key or sync state.
    NotReady,
    PersistenceCorrupt,
    PersistenceIoFailure,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("{0}")]
    MalformedInput(String),

    #[error("proposal {name}: invalid collateral: {source}")]
    InvalidCollateral {
        name: String,
        #[source]
        source: CollateralError,
    },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("already seen: {0}")]
    AlreadySeen(Hash256),

    #[error("proposal already known: {0}")]
    ProposalExists(Hash256),

    #[error("new vote older than existing vote - {vote}")]
    VoteOlderThanExisting { vote: Hash256 },

    #[error("time between votes is too soon - {vote} - {elapsed} sec < {min} sec")]
    VoteTooSoon {
        vote: Hash256,
        elapsed: i64,
        min: i64,
    },

    #[error("new vote is too far ahead of current time - {vote} - nTime {time} - Max Time {max}")]
    VoteTooFarAhead { vote: Hash256, time: i64, max: i64 },

    #[error("Proposal not found! ({0})")]
    UnknownProposal(Hash256),

    #[error("Proposal {name}: Active removal")]
    ActiveRemoval { name: String },

    #[error("Proposal can only be voted between block-start and block-end ({start}..={end}, tip {height})")]
    OutsideVotingWindow { start: i64, end: i64, height: i64 },

    #[error("unknown masternode: {0}")]
    UnknownMasternode(String),

    #[error("masternode is not a pillar: {0}")]
    NotPillar(String),

    #[error("{0}")]
    NotReady(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::MalformedInput(_) => ErrorKind::MalformedInput,
            GovernanceError::InvalidCollateral { .. } => ErrorKind::CollateralInvalid,
            GovernanceError::InvalidSignature(_) => ErrorKind::SignatureInvalid,
            GovernanceError::AlreadySeen(_)
            | GovernanceError::ProposalExists(_)
            | GovernanceError::VoteOlderThanExisting { .. } => ErrorKind::DuplicateOrReplayed,
            GovernanceError::VoteTooSoon { .. } | GovernanceError::VoteTooFarAhead { .. } => {
                ErrorKind::RateLimited
            }
            GovernanceError::UnknownProposal(_) => ErrorKind::UnknownProposal,
            GovernanceError::ActiveRemoval { .. } => ErrorKind::ActiveRemoval,
            GovernanceError::OutsideVotingWindow { .. } => ErrorKind::MalformedInput,
            GovernanceError::UnknownMasternode(_)
            | GovernanceError::NotPillar(_)
            | GovernanceError::NotReady(_)
            | GovernanceError::Signing(_) => ErrorKind::NotReady,
            GovernanceError::Persistence(e) => e.kind(),
        }
    }
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            GovernanceError::UnknownProposal(Hash256::ZERO).kind(),
            ErrorKind::UnknownProposal
        );
        assert_eq!(
            GovernanceError::VoteTooSoon {
                vote: Hash256::ZERO,
                elapsed: 1,
                min: 3600
            }
            .kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            GovernanceError::from(PersistenceError::IncorrectHash).kind(),
            ErrorKind::PersistenceCorrupt
        );
        let collateral = GovernanceError::InvalidCollateral {
            name: "x".into(),
            source: CollateralError::NoOutputs,
        };
        assert_eq!(collateral.kind(), ErrorKind::CollateralInvalid);
    }

    #[test]
    fn test_messages() {
        let e = GovernanceError::ActiveRemoval { name: "road-map".into() };
        assert_eq!(e.to_string(), "Proposal road-map: Active removal");
    }
}
