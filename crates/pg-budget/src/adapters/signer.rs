//! # secp256k1 message signer
//!
//! [`SigningOracle`] backed by `k256` ECDSA. Signatures are deterministic
//! (RFC 6979) 64-byte `r||s`; public keys are 33-byte compressed SEC1.
//! Secret key copies are zeroized as soon as the signing key is built.

use crate::ports::outbound::SigningOracle;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,
}

pub struct Secp256k1Signer {
    spork_pubkey: Vec<u8>,
}

impl Secp256k1Signer {
    /// Signer verifying spork messages against `spork_pubkey` (compressed SEC1).
    pub fn new(spork_pubkey: &[u8]) -> Result<Self, SignerError> {
        VerifyingKey::from_sec1_bytes(spork_pubkey).map_err(|_| SignerError::InvalidPublicKey)?;
        Ok(Self {
            spork_pubkey: spork_pubkey.to_vec(),
        })
    }

    /// Random 32-byte secret key.
    pub fn generate_secret() -> Zeroizing<Vec<u8>> {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Zeroizing::new(signing_key.to_bytes().to_vec())
    }

    fn signing_key(secret_key: &[u8]) -> Result<SigningKey, SignerError> {
        let bytes: Zeroizing<[u8; 32]> = Zeroizing::new(
            secret_key
                .try_into()
                .map_err(|_| SignerError::InvalidPrivateKey)?,
        );
        SigningKey::from_bytes((&*bytes).into()).map_err(|_| SignerError::InvalidPrivateKey)
    }

    /// Compressed public key for `secret_key`.
    pub fn derive_public_key(secret_key: &[u8]) -> Result<Vec<u8>, SignerError> {
        let signing_key = Self::signing_key(secret_key)?;
        Ok(signing_key.verifying_key().to_sec1_bytes().to_vec())
    }
}

impl SigningOracle for Secp256k1Signer {
    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, String> {
        let signing_key = Self::signing_key(secret_key).map_err(|e| e.to_string())?;
        let signature: Signature = signing_key.sign(message);
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, pubkey: &[u8], signature: &[u8], message: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(pubkey) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }

    fn public_key(&self, secret_key: &[u8]) -> Result<Vec<u8>, String> {
        Self::derive_public_key(secret_key).map_err(|e| e.to_string())
    }

    fn spork_pubkey(&self) -> Vec<u8> {
        self.spork_pubkey.clone()
    }
}
