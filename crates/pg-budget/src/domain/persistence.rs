//! # Budget Snapshot Format
//!
//! On-disk encoding of the budget ledger (`budget.dat`).
//!
//! ## Layout
//!
//! ```text
//! ┌─────────┬──────────────────┬───────────────┬─────────────────┬──────────┐
//! │ len: u8 │ "MasternodeBudget"│ network magic │ bincode(ledger) │ checksum │
//! │         │                  │   (4 bytes)   │                 │ (32 B)   │
//! └─────────┴──────────────────┴───────────────┴─────────────────┴──────────┘
//! ```
//!
//! The checksum is the double SHA-256 of every byte before it. Reading checks
//! the checksum first, then the magic message, then the network magic, and
//! only then decodes the ledger body, so each failure maps to its own error.

use super::entities::{BudgetProposal, BudgetVote, ProposalBroadcast};
use super::errors::ErrorKind;
use super::hashing::{double_sha256, Hash256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// File-specific magic message.
pub const MAGIC_MESSAGE: &str = "MasternodeBudget";

/// Data file name inside the node data directory.
pub const BUDGET_FILE_NAME: &str = "budget.dat";

const CHECKSUM_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Failed to open file {path}: {reason}")]
    FileError { path: String, reason: String },

    #[error("Budget file too short to hold a checksum ({0} bytes)")]
    HashReadError(usize),

    #[error("Checksum mismatch, data corrupted")]
    IncorrectHash,

    #[error("Invalid budget cache magic message")]
    IncorrectMagicMessage,

    #[error("Invalid network magic number")]
    IncorrectMagicNumber,

    #[error("Deserialize error: {0}")]
    IncorrectFormat(String),

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl PersistenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::FileError { .. }
            | PersistenceError::WriteFailed { .. }
            | PersistenceError::Serialize(_) => ErrorKind::PersistenceIoFailure,
            _ => ErrorKind::PersistenceCorrupt,
        }
    }
}

/// The persisted maps of the ledger.
///
/// Immature proposals and source-request timestamps are not persisted; they
/// are rebuilt from the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub seen_broadcasts: BTreeMap<Hash256, ProposalBroadcast>,
    pub seen_votes: BTreeMap<Hash256, BudgetVote>,
    pub orphan_votes: BTreeMap<Hash256, BudgetVote>,
    pub proposals: BTreeMap<Hash256, BudgetProposal>,
}

impl LedgerSnapshot {
    pub fn is_empty(&self) -> bool {
        self.seen_broadcasts.is_empty()
            && self.seen_votes.is_empty()
            && self.orphan_votes.is_empty()
            && self.proposals.is_empty()
    }
}

/// Encode `snapshot` for the network identified by `message_start`.
pub fn encode_snapshot(
    snapshot: &LedgerSnapshot,
    message_start: [u8; 4],
) -> Result<Vec<u8>, PersistenceError> {
    let body = bincode::serialize(snapshot).map_err(|e| PersistenceError::Serialize(e.to_string()))?;

    let mut buf = Vec::with_capacity(1 + MAGIC_MESSAGE.len() + 4 + body.len() + CHECKSUM_LEN);
    buf.push(MAGIC_MESSAGE.len() as u8);
    buf.extend_from_slice(MAGIC_MESSAGE.as_bytes());
    buf.extend_from_slice(&message_start);
    buf.extend_from_slice(&body);

    let checksum = double_sha256(&buf);
    buf.extend_from_slice(checksum.as_bytes());
    Ok(buf)
}

/// Decode and verify a snapshot written by [`encode_snapshot`].
pub fn decode_snapshot(
    bytes: &[u8],
    message_start: [u8; 4],
) -> Result<LedgerSnapshot, PersistenceError> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(PersistenceError::HashReadError(bytes.len()));
    }
    let (data, stored) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if double_sha256(data).as_bytes().as_slice() != stored {
        return Err(PersistenceError::IncorrectHash);
    }

    let (&magic_len, rest) = data
        .split_first()
        .ok_or_else(|| PersistenceError::IncorrectFormat("empty header".to_string()))?;
    let magic_len = magic_len as usize;
    if rest.len() < magic_len {
        return Err(PersistenceError::IncorrectFormat("truncated magic message".to_string()));
    }
    let (magic, rest) = rest.split_at(magic_len);
    if magic != MAGIC_MESSAGE.as_bytes() {
        return Err(PersistenceError::IncorrectMagicMessage);
    }

    if rest.len() < message_start.len() {
        return Err(PersistenceError::IncorrectFormat("truncated network magic".to_string()));
    }
    let (network_magic, body) = rest.split_at(message_start.len());
    if network_magic != message_start {
        return Err(PersistenceError::IncorrectMagicNumber);
    }

    bincode::deserialize(body).map_err(|e| PersistenceError::IncorrectFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{OutPoint, VoteOutcome};

    const MAGIC: [u8; 4] = [1, 2, 3, 4];

    fn populated() -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::default();
        let mut broadcast =
            ProposalBroadcast::new("road-map", "https://example.org/rm", 1000, 2000, Hash256::from_low_u64(7));
        broadcast.time = 1_700_000_000;
        let hash = broadcast.hash();
        let mut proposal = BudgetProposal::from(broadcast.clone());
        let vote = BudgetVote::new(
            OutPoint::new(Hash256::from_low_u64(1), 0),
            hash,
            VoteOutcome::Yes,
            1_700_000_100,
        );
        proposal.votes.insert(vote.voter, vote.clone());
        snapshot.seen_votes.insert(vote.hash(), vote);
        snapshot.seen_broadcasts.insert(hash, broadcast);
        snapshot.proposals.insert(hash, proposal);

        let orphan = BudgetVote::new(
            OutPoint::new(Hash256::from_low_u64(2), 1),
            Hash256::from_low_u64(99),
            VoteOutcome::No,
            1_700_000_200,
        );
        snapshot.orphan_votes.insert(orphan.proposal_hash, orphan);
        snapshot
    }

    #[test]
    fn test_round_trip() {
        let snapshot = populated();
        let bytes = encode_snapshot(&snapshot, MAGIC).unwrap();
        assert_eq!(decode_snapshot(&bytes, MAGIC).unwrap(), snapshot);
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let bytes = encode_snapshot(&populated(), MAGIC).unwrap();
        for index in [0, 5, bytes.len() / 2, bytes.len() - CHECKSUM_LEN - 1] {
            let mut corrupted = bytes.clone();
            corrupted[index] ^= 0x01;
            assert_eq!(
                decode_snapshot(&corrupted, MAGIC),
                Err(PersistenceError::IncorrectHash)
            );
        }
    }

    #[test]
    fn test_network_magic_mismatch() {
        let bytes = encode_snapshot(&populated(), MAGIC).unwrap();
        assert_eq!(
            decode_snapshot(&bytes, [9, 9, 9, 9]),
            Err(PersistenceError::IncorrectMagicNumber)
        );
    }

    #[test]
    fn test_magic_message_mismatch() {
        let mut data = vec![5u8];
        data.extend_from_slice(b"Other");
        data.extend_from_slice(&MAGIC);
        let checksum = double_sha256(&data);
        data.extend_from_slice(checksum.as_bytes());
        assert_eq!(
            decode_snapshot(&data, MAGIC),
            Err(PersistenceError::IncorrectMagicMessage)
        );
    }

    #[test]
    fn test_bad_body_is_format_error() {
        let mut data = vec![MAGIC_MESSAGE.len() as u8];
        data.extend_from_slice(MAGIC_MESSAGE.as_bytes());
        data.extend_from_slice(&MAGIC);
        data.extend_from_slice(&[0xff; 3]);
        let checksum = double_sha256(&data);
        data.extend_from_slice(checksum.as_bytes());
        assert!(matches!(
            decode_snapshot(&data, MAGIC),
            Err(PersistenceError::IncorrectFormat(_))
        ));
    }

    #[test]
    fn test_short_file() {
        assert_eq!(
            decode_snapshot(&[0u8; 10], MAGIC),
            Err(PersistenceError::HashReadError(10))
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PersistenceError::IncorrectMagicNumber.kind(),
            ErrorKind::PersistenceCorrupt
        );
        assert_eq!(
            PersistenceError::WriteFailed {
                path: "x".into(),
                reason: "y".into()
            }
            .kind(),
            ErrorKind::PersistenceIoFailure
        );
    }
}
