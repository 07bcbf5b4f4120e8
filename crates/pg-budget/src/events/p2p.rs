//! P2P message types for the governance subsystem.
//!
//! | Command | Direction | Payload |
//! |---------|-----------|---------|
//! | `mnvs`  | in/out    | proposal hash, zero for "everything" |
//! | `mprop` | in        | [`ProposalBroadcast`] |
//! | `mvote` | in        | [`BudgetVote`] |
//! | `ssc`   | out       | sync asset + item count, ends a sync exchange |

use super::WireError;
use crate::domain::params::{MAX_PROPOSAL_NAME_LEN, MAX_PROPOSAL_URL_LEN};
use crate::domain::{BudgetVote, Hash256, ProposalBroadcast};
use crate::ports::outbound::SyncAsset;
use serde::{Deserialize, Serialize};

pub const CMD_VOTE_SYNC: &str = "mnvs";
pub const CMD_PROPOSAL: &str = "mprop";
pub const CMD_VOTE: &str = "mvote";
pub const CMD_SYNC_STATUS: &str = "ssc";

/// Upper bound on any governance payload.
pub const MAX_PAYLOAD_SIZE: usize = 4 * 1024;

/// Inbound governance messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GovernanceMessage {
    /// Request proposals and votes. Zero hash asks for everything.
    VoteSync(Hash256),
    /// New proposal announcement.
    Proposal(ProposalBroadcast),
    /// Vote announcement.
    Vote(BudgetVote),
}

impl GovernanceMessage {
    pub fn command(&self) -> &'static str {
        match self {
            GovernanceMessage::VoteSync(_) => CMD_VOTE_SYNC,
            GovernanceMessage::Proposal(_) => CMD_PROPOSAL,
            GovernanceMessage::Vote(_) => CMD_VOTE,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let encoded = match self {
            GovernanceMessage::VoteSync(hash) => bincode::serialize(hash),
            GovernanceMessage::Proposal(broadcast) => bincode::serialize(broadcast),
            GovernanceMessage::Vote(vote) => bincode::serialize(vote),
        };
        encoded.map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decode a payload received under `command`.
    pub fn decode(command: &str, payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        match command {
            CMD_VOTE_SYNC => decode_as(CMD_VOTE_SYNC, payload).map(GovernanceMessage::VoteSync),
            CMD_PROPOSAL => {
                let broadcast: ProposalBroadcast = decode_as(CMD_PROPOSAL, payload)?;
                if broadcast.name.len() > MAX_PROPOSAL_NAME_LEN
                    || broadcast.url.len() > MAX_PROPOSAL_URL_LEN
                {
                    return Err(WireError::Malformed {
                        command: CMD_PROPOSAL,
                        reason: "name or url over limit".to_string(),
                    });
                }
                Ok(GovernanceMessage::Proposal(broadcast))
            }
            CMD_VOTE => decode_as(CMD_VOTE, payload).map(GovernanceMessage::Vote),
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }
}

fn decode_as<T: for<'de> Deserialize<'de>>(
    command: &'static str,
    payload: &[u8],
) -> Result<T, WireError> {
    bincode::deserialize(payload).map_err(|e| WireError::Malformed {
        command,
        reason: e.to_string(),
    })
}

/// Inventory announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryItem {
    Proposal(Hash256),
    Vote(Hash256),
}

impl InventoryItem {
    pub fn hash(&self) -> Hash256 {
        match self {
            InventoryItem::Proposal(hash) | InventoryItem::Vote(hash) => *hash,
        }
    }
}

/// Messages the governance subsystem sends to a single peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Inventory(InventoryItem),
    /// Ask the peer for a proposal and its votes.
    VoteSyncRequest(Hash256),
    /// Number of items sent for `asset`. Ends a sync exchange.
    SyncStatusCount { asset: SyncAsset, count: u32 },
}

impl OutboundMessage {
    pub fn command(&self) -> &'static str {
        match self {
            OutboundMessage::Inventory(_) => "inv",
            OutboundMessage::VoteSyncRequest(_) => CMD_VOTE_SYNC,
            OutboundMessage::SyncStatusCount { .. } => CMD_SYNC_STATUS,
        }
    }
}

/// Data behind an inventory hash, served to peers that request it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryPayload {
    Proposal(ProposalBroadcast),
    Vote(BudgetVote),
}

impl InventoryPayload {
    /// The inbound message a peer will receive for this payload.
    pub fn into_message(self) -> GovernanceMessage {
        match self {
            InventoryPayload::Proposal(broadcast) => GovernanceMessage::Proposal(broadcast),
            InventoryPayload::Vote(vote) => GovernanceMessage::Vote(vote),
        }
    }
}
