//! Binary transaction encoding used by the node for signing.
//!
//! Layout of a transaction:
//!
//! ```text
//! ref_block_num     u16 LE
//! ref_block_prefix  u32 LE
//! expiration        u32 LE (unix seconds)
//! operations        varuint count, then per operation:
//!                     varuint group length (always 1)
//!                     from, to          varuint length + UTF-8
//!                     amount            i64 LE, u8 precision, 7-byte symbol
//!                     memo              varuint length + UTF-8
//! extensions        varuint count (always 0)
//! signatures        varuint count, then varuint length + hex text each
//! ```
//!
//! The digest the node verifies is not taken over this encoding directly:
//! byte 11 (the group length of the first operation) is replaced by the
//! transfer operation id, and the final byte (the empty signature list) is
//! dropped. See [`WireTransaction::signing_bytes`].

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::chain::{Asset, BroadcastOperation, BroadcastTransaction, TransferParams, format_chain_time};

/// Operation id of `transfer` in the node's operation enumeration.
pub const TRANSFER_OPERATION_ID: u8 = 2;

const OPERATION_ID_OFFSET: usize = 11;
const SYMBOL_WIDTH: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("Varint at byte {0} does not fit in 32 bits")]
    VarintOverflow(usize),

    #[error("Invalid UTF-8 string at byte {0}")]
    InvalidUtf8(usize),

    #[error("Symbol {0} does not fit in {SYMBOL_WIDTH} bytes")]
    SymbolTooLong(String),

    #[error("Operation groups of {0} entries are not supported")]
    UnsupportedOperationGroup(u32),

    #[error("Transaction extensions are not supported")]
    UnsupportedExtensions,

    #[error("{0} trailing byte(s) after transaction")]
    TrailingBytes(usize),

    #[error("Transaction has no operations to sign")]
    NoOperations,

    #[error("Expiration {0} is outside the chain time range")]
    InvalidExpiration(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    pub from: String,
    pub to: String,
    pub amount: Asset,
    pub memo: String,
}

/// A transfer transaction in the shape the node encodes and signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    /// Unix seconds.
    pub expiration: u32,
    pub operations: Vec<TransferOperation>,
    /// Hex-encoded 65-byte compact signatures.
    pub signatures: Vec<String>,
}

impl WireTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut w = Writer::default();
        w.u16(self.ref_block_num);
        w.u32(self.ref_block_prefix);
        w.u32(self.expiration);

        w.varuint(self.operations.len() as u32);
        for op in &self.operations {
            w.varuint(1);
            w.string(&op.from);
            w.string(&op.to);
            w.asset(&op.amount)?;
            w.string(&op.memo);
        }

        w.varuint(0);
        w.varuint(self.signatures.len() as u32);
        for signature in &self.signatures {
            w.string(signature);
        }
        Ok(w.0)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader { bytes, pos: 0 };
        let ref_block_num = r.u16()?;
        let ref_block_prefix = r.u32()?;
        let expiration = r.u32()?;

        let count = r.varuint()?;
        let mut operations = Vec::with_capacity(count.min(16) as usize);
        for _ in 0..count {
            let group = r.varuint()?;
            if group != 1 {
                return Err(CodecError::UnsupportedOperationGroup(group));
            }
            operations.push(TransferOperation {
                from: r.string()?,
                to: r.string()?,
                amount: r.asset()?,
                memo: r.string()?,
            });
        }

        if r.varuint()? != 0 {
            return Err(CodecError::UnsupportedExtensions);
        }

        let count = r.varuint()?;
        let mut signatures = Vec::with_capacity(count.min(16) as usize);
        for _ in 0..count {
            signatures.push(r.string()?);
        }

        let rest = bytes.len() - r.pos;
        if rest != 0 {
            return Err(CodecError::TrailingBytes(rest));
        }

        Ok(Self {
            ref_block_num,
            ref_block_prefix,
            expiration,
            operations,
            signatures,
        })
    }

    /// Bytes the node hashes for signature verification.
    ///
    /// Always computed over the unsigned transaction.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CodecError> {
        if self.operations.is_empty() {
            return Err(CodecError::NoOperations);
        }
        let unsigned = WireTransaction {
            signatures: Vec::new(),
            ..self.clone()
        };
        let mut bytes = unsigned.encode()?;
        bytes[OPERATION_ID_OFFSET] = TRANSFER_OPERATION_ID;
        bytes.pop();
        Ok(bytes)
    }

    /// JSON envelope for `broadcast_transaction_synchronous`.
    pub fn to_broadcast(&self) -> Result<BroadcastTransaction, CodecError> {
        let expiration = chrono::DateTime::from_timestamp(i64::from(self.expiration), 0)
            .ok_or(CodecError::InvalidExpiration(self.expiration))?;

        Ok(BroadcastTransaction {
            ref_block_num: self.ref_block_num,
            ref_block_prefix: self.ref_block_prefix,
            expiration: format_chain_time(&expiration),
            operations: self
                .operations
                .iter()
                .map(|op| {
                    BroadcastOperation(
                        "transfer".to_string(),
                        TransferParams {
                            from: op.from.clone(),
                            to: op.to.clone(),
                            amount: op.amount.to_string(),
                            memo: op.memo.clone(),
                        },
                    )
                })
                .collect(),
            extensions: Vec::new(),
            signatures: self.signatures.clone(),
        })
    }
}

/// `SHA-256(chain_id ++ signing_bytes)`.
pub fn signing_digest(chain_id: &[u8], signing_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id);
    hasher.update(signing_bytes);
    hasher.finalize().into()
}

#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn varuint(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.0.push(byte);
                return;
            }
            self.0.push(byte | 0x80);
        }
    }

    fn string(&mut self, s: &str) {
        self.varuint(s.len() as u32);
        self.0.extend_from_slice(s.as_bytes());
    }

    fn asset(&mut self, asset: &Asset) -> Result<(), CodecError> {
        let symbol = asset.symbol.as_bytes();
        if symbol.len() > SYMBOL_WIDTH {
            return Err(CodecError::SymbolTooLong(asset.symbol.clone()));
        }
        self.0.extend_from_slice(&asset.amount.to_le_bytes());
        self.0.push(asset.precision);
        self.0.extend_from_slice(symbol);
        self.0.resize(self.0.len() + SYMBOL_WIDTH - symbol.len(), 0);
        Ok(())
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn varuint(&mut self) -> Result<u32, CodecError> {
        let start = self.pos;
        let mut value: u64 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return u32::try_from(value).map_err(|_| CodecError::VarintOverflow(start));
            }
        }
        Err(CodecError::VarintOverflow(start))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.varuint()? as usize;
        let start = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(start))
    }

    fn asset(&mut self) -> Result<Asset, CodecError> {
        let amount = i64::from_le_bytes(self.array()?);
        let precision = self.array::<1>()?[0];
        let start = self.pos;
        let raw: [u8; SYMBOL_WIDTH] = self.array()?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(SYMBOL_WIDTH);
        let symbol = std::str::from_utf8(&raw[..end]).map_err(|_| CodecError::InvalidUtf8(start))?;
        Ok(Asset::new(amount, precision, symbol))
    }
}
