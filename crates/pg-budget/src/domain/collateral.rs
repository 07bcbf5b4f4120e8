//! Proposal collateral validation.
//!
//! A collateral-backed proposal must point at a transaction that burns the
//! proposal fee into an `OP_RETURN <proposal hash>` output and has been
//! buried deep enough in the active chain.

use super::hashing::Hash256;
use super::params::NetworkParams;
use crate::ports::outbound::ChainOracle;
use thiserror::Error;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;
pub const OP_RETURN: u8 = 0x6a;

/// Largest script the interpreter accepts; longer ones are unspendable.
const MAX_SCRIPT_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollateralError {
    #[error("Can't find collateral tx {0}")]
    NotFound(Hash256),

    #[error("Collateral transaction has a lock time ({0})")]
    LockTime(u32),

    #[error("Collateral transaction has no outputs")]
    NoOutputs,

    #[error("Invalid Script {0}")]
    NonStandardScript(String),

    #[error("Couldn't find opReturn {expected} in {tx}")]
    CommitmentNotFound { expected: Hash256, tx: Hash256 },

    #[error("Collateral requires at least {required} confirmations - {confirmations} confirmations")]
    Immature { confirmations: i64, required: i64 },
}

impl CollateralError {
    /// Confirmations observed before the check failed.
    ///
    /// Nonzero only for immature collateral; callers use it to decide whether
    /// a proposal is worth queueing.
    pub fn confirmations(&self) -> i64 {
        match self {
            CollateralError::Immature { confirmations, .. } => *confirmations,
            _ => 0,
        }
    }

    pub fn is_immature(&self) -> bool {
        matches!(self, CollateralError::Immature { .. })
    }
}

/// Output script shapes the collateral check distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PayToPubKeyHash,
    PayToScriptHash,
    PayToPubKey,
    /// Provably unspendable (data carrier).
    Unspendable,
    NonStandard,
}

impl ScriptKind {
    pub fn is_acceptable(self) -> bool {
        !matches!(self, ScriptKind::NonStandard)
    }
}

pub fn classify_script(script: &[u8]) -> ScriptKind {
    match script {
        [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            ScriptKind::PayToPubKeyHash
        }
        [OP_HASH160, 0x14, hash @ .., OP_EQUAL] if hash.len() == 20 => ScriptKind::PayToScriptHash,
        [0x21, key @ .., OP_CHECKSIG] if key.len() == 33 => ScriptKind::PayToPubKey,
        [0x41, key @ .., OP_CHECKSIG] if key.len() == 65 => ScriptKind::PayToPubKey,
        [OP_RETURN, ..] => ScriptKind::Unspendable,
        _ if script.len() > MAX_SCRIPT_SIZE => ScriptKind::Unspendable,
        _ => ScriptKind::NonStandard,
    }
}

/// `OP_RETURN <32-byte hash>`, the output a collateral transaction must carry.
pub fn commitment_script(proposal_hash: &Hash256) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.push(OP_RETURN);
    script.push(0x20);
    script.extend_from_slice(proposal_hash.as_bytes());
    script
}

/// Result of a successful collateral check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralReceipt {
    pub confirmations: i64,
    /// Timestamp of the containing block when it is on the active chain.
    pub block_time: Option<i64>,
}

/// Validate the collateral transaction `fee_tx` for `expected` proposal hash.
pub fn check_collateral(
    chain: &dyn ChainOracle,
    params: &NetworkParams,
    fee_tx: &Hash256,
    expected: &Hash256,
) -> Result<CollateralReceipt, CollateralError> {
    let tx = chain
        .get_transaction(fee_tx)
        .ok_or(CollateralError::NotFound(*fee_tx))?;

    if tx.outputs.is_empty() {
        return Err(CollateralError::NoOutputs);
    }
    if tx.lock_time != 0 {
        return Err(CollateralError::LockTime(tx.lock_time));
    }

    let commitment = commitment_script(expected);
    let mut found_commitment = false;
    for output in &tx.outputs {
        if !classify_script(&output.script).is_acceptable() {
            return Err(CollateralError::NonStandardScript(hex::encode(&output.script)));
        }
        if output.script == commitment && output.value >= params.proposal_fee {
            found_commitment = true;
        }
    }
    if !found_commitment {
        return Err(CollateralError::CommitmentNotFound {
            expected: *expected,
            tx: tx.hash,
        });
    }

    let mut confirmations = tx.instant_confirmations;
    let mut block_time = None;
    if let Some(block) = tx.block_hash.and_then(|hash| chain.get_block(&hash)) {
        if block.in_active_chain {
            if let Some(tip) = chain.tip() {
                confirmations += tip.height - block.height + 1;
            }
            block_time = Some(block.time);
        }
    }

    if confirmations >= params.required_confirmations {
        Ok(CollateralReceipt {
            confirmations,
            block_time,
        })
    } else {
        Err(CollateralError::Immature {
            confirmations,
            required: params.required_confirmations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::{Network, PROPOSAL_FEE};
    use crate::ports::outbound::{BlockInfo, ChainTip, TransactionInfo, TxOutput};

    struct StubChain {
        tx: Option<TransactionInfo>,
        block: Option<BlockInfo>,
        tip_height: i64,
    }

    impl ChainOracle for StubChain {
        fn tip(&self) -> Option<ChainTip> {
            Some(ChainTip {
                height: self.tip_height,
                time: 0,
            })
        }
        fn get_transaction(&self, _hash: &Hash256) -> Option<TransactionInfo> {
            self.tx.clone()
        }
        fn get_block(&self, _hash: &Hash256) -> Option<BlockInfo> {
            self.block
        }
        fn adjusted_time(&self) -> i64 {
            0
        }
    }

    fn p2pkh() -> Vec<u8> {
        let mut s = vec![OP_DUP, OP_HASH160, 0x14];
        s.extend_from_slice(&[7u8; 20]);
        s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        s
    }

    fn collateral_tx(expected: &Hash256, value: i64) -> TransactionInfo {
        TransactionInfo {
            hash: Hash256::from_low_u64(0xfee),
            lock_time: 0,
            outputs: vec![
                TxOutput {
                    value,
                    script: commitment_script(expected),
                },
                TxOutput {
                    value: 1,
                    script: p2pkh(),
                },
            ],
            instant_confirmations: 0,
            block_hash: Some(Hash256::from_low_u64(0xb10c)),
        }
    }

    fn chain(tx: TransactionInfo, block_height: i64, tip_height: i64) -> StubChain {
        StubChain {
            tx: Some(tx),
            block: Some(BlockInfo {
                height: block_height,
                time: 4242,
                in_active_chain: true,
            }),
            tip_height,
        }
    }

    fn params() -> NetworkParams {
        NetworkParams::for_network(Network::Main)
    }

    #[test]
    fn test_classify_script() {
        assert_eq!(classify_script(&p2pkh()), ScriptKind::PayToPubKeyHash);
        let mut p2sh = vec![OP_HASH160, 0x14];
        p2sh.extend_from_slice(&[1u8; 20]);
        p2sh.push(OP_EQUAL);
        assert_eq!(classify_script(&p2sh), ScriptKind::PayToScriptHash);
        let mut p2pk = vec![0x21];
        p2pk.extend_from_slice(&[2u8; 33]);
        p2pk.push(OP_CHECKSIG);
        assert_eq!(classify_script(&p2pk), ScriptKind::PayToPubKey);
        assert_eq!(classify_script(&[OP_RETURN]), ScriptKind::Unspendable);
        assert_eq!(classify_script(&[0x51]), ScriptKind::NonStandard);
        assert_eq!(classify_script(&[]), ScriptKind::NonStandard);
    }

    #[test]
    fn test_mature_collateral_is_valid() {
        let expected = Hash256::from_low_u64(1);
        let chain = chain(collateral_tx(&expected, PROPOSAL_FEE), 100, 105);
        let receipt = check_collateral(&chain, &params(), &Hash256::ZERO, &expected).unwrap();
        assert_eq!(receipt.confirmations, 6);
        assert_eq!(receipt.block_time, Some(4242));
    }

    #[test]
    fn test_immature_collateral_reports_count() {
        let expected = Hash256::from_low_u64(1);
        let chain = chain(collateral_tx(&expected, PROPOSAL_FEE), 100, 101);
        let err = check_collateral(&chain, &params(), &Hash256::ZERO, &expected).unwrap_err();
        assert_eq!(
            err,
            CollateralError::Immature {
                confirmations: 2,
                required: 6
            }
        );
        assert_eq!(err.confirmations(), 2);
        assert!(err.to_string().contains("2 confirmations"));
    }

    #[test]
    fn test_instant_confirmations_count() {
        let expected = Hash256::from_low_u64(1);
        let mut tx = collateral_tx(&expected, PROPOSAL_FEE);
        tx.block_hash = None;
        tx.instant_confirmations = 6;
        let chain = chain(tx, 0, 0);
        let receipt = check_collateral(&chain, &params(), &Hash256::ZERO, &expected).unwrap();
        assert_eq!(receipt.confirmations, 6);
        assert_eq!(receipt.block_time, None);
    }

    #[test]
    fn test_missing_tx() {
        let chain = StubChain {
            tx: None,
            block: None,
            tip_height: 0,
        };
        let err =
            check_collateral(&chain, &params(), &Hash256::ZERO, &Hash256::ZERO).unwrap_err();
        assert!(matches!(err, CollateralError::NotFound(_)));
    }

    #[test]
    fn test_lock_time_rejected() {
        let expected = Hash256::from_low_u64(1);
        let mut tx = collateral_tx(&expected, PROPOSAL_FEE);
        tx.lock_time = 5;
        let err = check_collateral(&chain(tx, 1, 100), &params(), &Hash256::ZERO, &expected)
            .unwrap_err();
        assert_eq!(err, CollateralError::LockTime(5));
    }

    #[test]
    fn test_nonstandard_output_rejected() {
        let expected = Hash256::from_low_u64(1);
        let mut tx = collateral_tx(&expected, PROPOSAL_FEE);
        tx.outputs.push(TxOutput {
            value: 1,
            script: vec![0x51, 0x52],
        });
        let err = check_collateral(&chain(tx, 1, 100), &params(), &Hash256::ZERO, &expected)
            .unwrap_err();
        assert!(matches!(err, CollateralError::NonStandardScript(_)));
    }

    #[test]
    fn test_underpaid_commitment_rejected() {
        let expected = Hash256::from_low_u64(1);
        let tx = collateral_tx(&expected, PROPOSAL_FEE - 1);
        let err = check_collateral(&chain(tx, 1, 100), &params(), &Hash256::ZERO, &expected)
            .unwrap_err();
        assert!(matches!(err, CollateralError::CommitmentNotFound { .. }));
        assert!(err.to_string().contains("opReturn"));
    }

    #[test]
    fn test_commitment_for_other_proposal_rejected() {
        let tx = collateral_tx(&Hash256::from_low_u64(2), PROPOSAL_FEE);
        let err = check_collateral(
            &chain(tx, 1, 100),
            &params(),
            &Hash256::ZERO,
            &Hash256::from_low_u64(1),
        )
        .unwrap_err();
        assert!(matches!(err, CollateralError::CommitmentNotFound { .. }));
    }

    #[test]
    fn test_block_off_active_chain_adds_no_depth() {
        let expected = Hash256::from_low_u64(1);
        let mut chain = chain(collateral_tx(&expected, PROPOSAL_FEE), 1, 100);
        if let Some(block) = chain.block.as_mut() {
            block.in_active_chain = false;
        }
        let err = check_collateral(&chain, &params(), &Hash256::ZERO, &expected).unwrap_err();
        assert_eq!(err.confirmations(), 0);
    }
}
