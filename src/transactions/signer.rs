use std::collections::HashMap;

use secp256k1::{
    Message, PublicKey, Secp256k1, SecretKey,
    ecdsa::{RecoverableSignature, RecoveryId, Signature},
};
use thiserror::Error;

use crate::db::AddressRow;

pub const CURVE_SECP256K1: &str = "secp256k1";

/// Recovery header offset for signatures over compressed public keys.
const COMPACT_HEADER: u8 = 27 + 4;
const MAX_SIGNING_ATTEMPTS: u32 = 256;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature does not match public key")]
    Mismatch,

    #[error("No canonical signature found")]
    NotCanonical,

    #[error("No private key for address {0}")]
    MissingKey(String),
}

/// External signer seen by the transaction builder.
pub trait TransactionSigner: Send + Sync {
    /// Signs a 32-byte digest, returning a 64-byte compact `r ++ s` signature.
    fn sign(&self, digest: &[u8], private_key: &[u8], curve_type: &str) -> Result<Vec<u8>, SignerError>;

    /// Checks `signature` against `public_key` and returns the 65-byte form the node accepts.
    fn verify_and_combine(&self, digest: &[u8], public_key: &[u8], signature: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// Source of private keys for the addresses of an account.
pub trait KeyStore: Send + Sync {
    fn private_key(&self, address: &AddressRow) -> Result<Vec<u8>, SignerError>;
}

/// Keys held in memory, by address.
impl KeyStore for HashMap<String, Vec<u8>> {
    fn private_key(&self, address: &AddressRow) -> Result<Vec<u8>, SignerError> {
        self.get(&address.address)
            .cloned()
            .ok_or_else(|| SignerError::MissingKey(address.address.clone()))
    }
}

#[derive(Default)]
pub struct Secp256k1Signer {
    secp: Secp256k1<secp256k1::All>,
}

impl Secp256k1Signer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Neither `r` nor `s` may have its high bit set or carry a redundant leading zero.
fn is_canonical(compact: &[u8; 64]) -> bool {
    let r = &compact[..32];
    let s = &compact[32..];
    let ok = |v: &[u8]| v[0] & 0x80 == 0 && !(v[0] == 0 && v[1] & 0x80 == 0);
    ok(r) && ok(s)
}

fn message(digest: &[u8]) -> Result<Message, SignerError> {
    Message::from_digest_slice(digest).map_err(|e| SignerError::InvalidDigest(e.to_string()))
}

impl TransactionSigner for Secp256k1Signer {
    fn sign(&self, digest: &[u8], private_key: &[u8], curve_type: &str) -> Result<Vec<u8>, SignerError> {
        if !curve_type.eq_ignore_ascii_case(CURVE_SECP256K1) {
            return Err(SignerError::UnsupportedCurve(curve_type.to_string()));
        }
        let msg = message(digest)?;
        let key = SecretKey::from_slice(private_key).map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        let mut compact = self.secp.sign_ecdsa(&msg, &key).serialize_compact();
        let mut attempt = 0u32;
        while !is_canonical(&compact) {
            attempt += 1;
            if attempt > MAX_SIGNING_ATTEMPTS {
                return Err(SignerError::NotCanonical);
            }
            let mut nonce = [0u8; 32];
            nonce[..4].copy_from_slice(&attempt.to_le_bytes());
            compact = self
                .secp
                .sign_ecdsa_with_noncedata(&msg, &key, &nonce)
                .serialize_compact();
        }
        Ok(compact.to_vec())
    }

    fn verify_and_combine(&self, digest: &[u8], public_key: &[u8], signature: &[u8]) -> Result<Vec<u8>, SignerError> {
        let msg = message(digest)?;
        let key = PublicKey::from_slice(public_key).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let sig = Signature::from_compact(signature).map_err(|e| SignerError::InvalidSignature(e.to_string()))?;

        self.secp
            .verify_ecdsa(&msg, &sig, &key)
            .map_err(|_| SignerError::Mismatch)?;

        for id in 0..2 {
            let recid = RecoveryId::from_i32(id).map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
            let recoverable = RecoverableSignature::from_compact(signature, recid)
                .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
            if self.secp.recover_ecdsa(&msg, &recoverable).ok() == Some(key) {
                let mut combined = Vec::with_capacity(65);
                combined.push(COMPACT_HEADER + id as u8);
                combined.extend_from_slice(signature);
                return Ok(combined);
            }
        }
        Err(SignerError::Mismatch)
    }
}
