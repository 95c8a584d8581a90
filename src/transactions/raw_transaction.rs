use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{db::AddressRow, models::Coin, transactions::error::TransactionError};

/// A digest to be signed by one address of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub ecc_type: String,
    pub nonce: String,
    pub address: AddressRow,
    /// Hex-encoded signing digest.
    pub message: String,
    /// Hex-encoded compact signature, empty until signed.
    pub signature: String,
}

/// A transfer moving through build, sign, verify and submit.
///
/// Owned by the caller; the [`TransactionDecoder`](super::TransactionDecoder)
/// only fills it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub coin: Coin,
    pub account_id: String,
    /// Destination alias to decimal amount. Exactly one entry.
    pub to: BTreeMap<String, String>,
    pub ext_params: BTreeMap<String, String>,
    pub required: u64,

    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub expiration: u32,
    /// Hex of the unpatched binary encoding.
    pub raw_hex: String,
    /// Signature requests by account id.
    pub signatures: BTreeMap<String, Vec<KeySignature>>,
    pub fee_rate: String,
    pub fees: String,

    pub tx_id: String,
    pub tx_from: Vec<String>,
    pub tx_to: Vec<String>,
    /// Net change of the source account, e.g. `"-1.5"`.
    pub tx_amount: String,

    pub is_built: bool,
    pub is_completed: bool,
    pub is_submit: bool,
}

impl RawTransaction {
    pub fn new(coin: Coin, account_id: &str, to: &str, amount: &str) -> Self {
        Self {
            coin,
            account_id: account_id.to_string(),
            to: BTreeMap::from([(to.to_string(), amount.to_string())]),
            required: 1,
            ..Default::default()
        }
    }

    pub fn with_memo(mut self, memo: &str) -> Self {
        self.ext_params.insert("memo".to_string(), memo.to_string());
        self
    }

    pub fn memo(&self) -> &str {
        self.ext_params.get("memo").map(String::as_str).unwrap_or_default()
    }

    pub(crate) fn recipient(&self) -> Result<(&str, &str), TransactionError> {
        let mut entries = self.to.iter();
        match (entries.next(), entries.next()) {
            (Some((to, amount)), None) => Ok((to, amount)),
            _ => Err(TransactionError::InvalidArgument(format!(
                "expected exactly one recipient, got {}",
                self.to.len()
            ))),
        }
    }
}

/// Request to sweep an account's balance to a summary address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRawTransaction {
    pub coin: Coin,
    pub account_id: String,
    pub summary_address: String,
    /// Accounts holding less than this are skipped.
    pub min_transfer: String,
    /// Left behind in the source account.
    pub retained_balance: String,
    pub ext_params: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct RawTransactionWithError {
    pub raw_tx: RawTransaction,
    pub error: Option<TransactionError>,
}
