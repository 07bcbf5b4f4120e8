//! Domain layer: entities, validation rules and the budget ledger.

pub mod collateral;
pub mod entities;
pub mod errors;
pub mod hashing;
pub mod ledger;
pub mod params;
pub mod persistence;
pub mod validation;

pub use collateral::{check_collateral, commitment_script, CollateralError, CollateralReceipt};
pub use entities::{
    BudgetProposal, BudgetVote, FundingWindow, OutPoint, ProposalBroadcast, VoteOutcome,
    VoteUpdate,
};
pub use errors::{ErrorKind, GovernanceError, GovernanceResult};
pub use hashing::{double_sha256, Hash256, HashWriter, ParseHashError};
pub use ledger::{
    compare_for_funding, BudgetLedger, ImmatureSweep, LedgerLimits, UnknownProposal,
    VoteDisposition, VoteOrigin, VoteRejection,
};
pub use params::{Network, NetworkParams};
pub use persistence::{LedgerSnapshot, PersistenceError};
pub use validation::ValidationEnv;
