//! Wire messages and codec errors for the governance protocol.

use thiserror::Error;

pub mod p2p;

pub use p2p::*;

/// Governance wire codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Unknown governance command: {0}")]
    UnknownCommand(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Malformed {command} payload: {reason}")]
    Malformed { command: &'static str, reason: String },

    #[error("Encode error: {0}")]
    Encode(String),
}
