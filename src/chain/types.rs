use serde::{Deserialize, Serialize};

use super::DecodeError;
use crate::models::BlockHeader;

/// Node head as reported by `get_dynamic_global_properties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub height: u64,
    pub block_id: String,
    pub last_irreversible_height: u64,
}

impl ChainHead {
    pub fn ref_block_num(&self) -> u16 {
        ref_block_num(self.last_irreversible_height)
    }
}

/// Low 16 bits of the block number preceding `height`.
pub fn ref_block_num(height: u64) -> u16 {
    (height.wrapping_sub(1) & 0xFFFF) as u16
}

/// A decoded block. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transfer_events: Vec<TransferEvent>,
    /// Operations that did not decode as transfers (no amount, malformed amount, or a missing party).
    pub skipped_operations: usize,
}

impl Block {
    /// Replay-protection prefix: bytes 4..8 of the previous block id, read little endian.
    ///
    /// Block ids start with the big-endian block number, so the first four bytes carry no entropy.
    pub fn ref_block_prefix(&self) -> Result<u32, DecodeError> {
        let bytes = hex::decode(&self.previous_hash).map_err(|_| DecodeError::InvalidHash(self.previous_hash.clone()))?;
        let prefix: [u8; 4] = bytes
            .get(4..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| DecodeError::InvalidHash(self.previous_hash.clone()))?;
        Ok(u32::from_le_bytes(prefix))
    }

    pub fn header(&self, symbol: &str) -> BlockHeader {
        BlockHeader {
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            height: self.height,
            time: self.timestamp,
            symbol: symbol.to_string(),
            fork: false,
        }
    }
}

/// One transfer-like operation flattened out of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub op_type: String,
    pub from: String,
    pub to: String,
    /// Decimal amount without the tag.
    pub amount: String,
    pub currency_tag: String,
    pub memo: String,
    pub transaction_id: String,
    pub operation_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub alias: String,
    pub amount: String,
    pub currency_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub id: String,
    pub block_num: u64,
    pub trx_num: u32,
    pub expired: bool,
}

/// JSON shape expected by `broadcast_transaction_synchronous`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTransaction {
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    /// `YYYY-MM-DDTHH:MM:SS`, UTC.
    pub expiration: String,
    pub operations: Vec<BroadcastOperation>,
    pub extensions: Vec<serde_json::Value>,
    pub signatures: Vec<String>,
}

/// Serialized as `["transfer", {...}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastOperation(pub String, pub TransferParams);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from: String,
    pub to: String,
    /// Tagged amount, e.g. `"1.00000000 PIA"`.
    pub amount: String,
    pub memo: String,
}
