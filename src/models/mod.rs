//! Data models shared by the scanner, the extraction pipeline and the
//! transaction builder.
//!
//! # Key Types
//!
//! - [`BlockHeader`] - Header notified to observers (fork flag set on recovery)
//! - [`ScanCursor`] - Last block accepted as canonical, persisted between sessions
//! - [`UnscanRecord`] - Durable marker for a block or transaction that must be re-processed
//! - [`TxExtractData`] - One account's view of one native transfer (transaction + input/output side)
//! - [`LedgerTransaction`] - Normalized transaction record handed to consumers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Block header as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub previous_hash: String,
    pub height: u64,
    pub time: u64,
    pub symbol: String,
    /// Set when the header belongs to a block orphaned by a fork.
    pub fork: bool,
}

/// The last block height successfully scanned and accepted as canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    pub height: u64,
    pub hash: String,
}

/// A block or transaction that failed extraction or notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnscanRecord {
    pub id: String,
    pub block_height: u64,
    pub tx_id: String,
    pub reason: String,
}

impl UnscanRecord {
    pub fn new(block_height: u64, tx_id: &str, reason: &str) -> Self {
        Self {
            id: unscan_record_id(block_height, tx_id),
            block_height,
            tx_id: tx_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Records for the same height and transaction share an id, so re-recording a failure is an upsert.
pub fn unscan_record_id(block_height: u64, tx_id: &str) -> String {
    hex::encode(Sha256::digest(format!("{}_{}", block_height, tx_id).as_bytes()))
}

/// On-chain balance of one alias, normalized to a trimmed decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub symbol: String,
    pub address: String,
    pub balance: String,
    pub confirm_balance: String,
    pub unconfirm_balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coin {
    pub symbol: String,
    pub is_contract: bool,
    pub contract_id: String,
}

impl Coin {
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            is_contract: false,
            contract_id: String::new(),
        }
    }
}

/// Normalized transaction record delivered to consumers and returned after broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub wx_id: String,
    pub tx_id: String,
    pub account_id: String,
    pub coin: Coin,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub amount: String,
    pub decimals: u8,
    pub fees: String,
    pub block_hash: String,
    pub block_height: u64,
    pub confirm_time: i64,
    pub submit_time: i64,
    pub is_memo: bool,
    pub status: String,
    pub reason: String,
    pub ext_params: BTreeMap<String, String>,
}

impl LedgerTransaction {
    pub fn memo(&self) -> Option<&str> {
        self.ext_params.get("memo").map(String::as_str)
    }

    pub fn set_memo(&mut self, memo: &str) {
        self.ext_params.insert("memo".to_string(), memo.to_string());
    }
}

/// One side (input or output) of a native transfer, scoped to a tracked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recharge {
    pub sid: String,
    pub tx_id: String,
    pub address: String,
    pub coin: Coin,
    pub amount: String,
    pub symbol: String,
    pub block_hash: String,
    pub block_height: u64,
    /// Account-model chains have a single input/output per transfer.
    pub index: u64,
    pub created_at: i64,
}

/// Everything one tracked account learns from one native transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxExtractData {
    pub transaction: LedgerTransaction,
    pub inputs: Vec<Recharge>,
    pub outputs: Vec<Recharge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RechargeSide {
    Input,
    Output,
}

impl RechargeSide {
    fn as_str(&self) -> &'static str {
        match self {
            RechargeSide::Input => "input",
            RechargeSide::Output => "output",
        }
    }
}

/// Deduplication key for one side of a transfer.
pub fn gen_recharge_sid(side: RechargeSide, tx_id: &str, symbol: &str, contract_id: &str, index: u64) -> String {
    let preimage = format!("{}_{}_{}_{}_{}", side.as_str(), tx_id, symbol, contract_id, index);
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

/// Deduplication key for a whole transaction record.
pub fn gen_transaction_wx_id(tx_id: &str, symbol: &str, contract_id: &str, index: u64) -> String {
    let preimage = format!("{}_{}_{}_{}", tx_id, symbol, contract_id, index);
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscan_record_id_is_stable_per_height_and_tx() {
        let a = UnscanRecord::new(100, "", "extract failed");
        let b = UnscanRecord::new(100, "", "notify failed");
        let c = UnscanRecord::new(101, "", "extract failed");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn recharge_sids_differ_by_side_and_index() {
        let input = gen_recharge_sid(RechargeSide::Input, "abc", "PIA", "", 0);
        let output = gen_recharge_sid(RechargeSide::Output, "abc", "PIA", "", 0);
        let second_op = gen_recharge_sid(RechargeSide::Input, "abc", "PIA", "", 1);

        assert_ne!(input, output);
        assert_ne!(input, second_op);
        assert_eq!(input, gen_recharge_sid(RechargeSide::Input, "abc", "PIA", "", 0));
    }
}
