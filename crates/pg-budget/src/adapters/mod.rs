//! Adapters: concrete implementations of outbound ports and storage.

pub mod budget_db;
pub mod signer;

pub use budget_db::BudgetDb;
pub use signer::{Secp256k1Signer, SignerError};
