use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{
    asset::split_asset,
    types::{Block, TransferEvent},
};

const CHAIN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid block timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Block timestamp {0:?} is before the unix epoch")]
    TimestampOutOfRange(String),

    #[error("Invalid block hash: {0:?}")]
    InvalidHash(String),
}

/// Raw `database_api.get_block` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiBlock {
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub previous: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<ApiTransaction>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTransaction {
    #[serde(default)]
    pub operations: Vec<Value>,
}

/// Parses the node's `YYYY-MM-DDTHH:MM:SS[.fff]` timestamps as UTC.
pub fn parse_chain_time(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    let trimmed = value.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|source| DecodeError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

pub fn format_chain_time(time: &DateTime<Utc>) -> String {
    time.format(CHAIN_TIME_FORMAT).to_string()
}

/// Turns a raw block into a [`Block`], flattening transfer-like operations in
/// transaction order, then operation order.
///
/// A malformed timestamp fails the whole block. Malformed operations are skipped
/// and counted in [`Block::skipped_operations`].
pub fn decode_block(raw: ApiBlock, requested_height: u64) -> Result<Block, DecodeError> {
    let height = if raw.block_number == 0 {
        requested_height
    } else {
        raw.block_number
    };

    let time = parse_chain_time(&raw.timestamp)?;
    let timestamp = u64::try_from(time.timestamp()).map_err(|_| DecodeError::TimestampOutOfRange(raw.timestamp.clone()))?;

    let mut transfer_events = Vec::new();
    let mut skipped_operations = 0;

    for (tx_index, tx) in raw.transactions.iter().enumerate() {
        let transaction_id = raw.transaction_ids.get(tx_index).cloned().unwrap_or_default();

        for (op_index, op) in tx.operations.iter().enumerate() {
            match decode_operation(op, &transaction_id, op_index as u64) {
                Some(event) => transfer_events.push(event),
                None => skipped_operations += 1,
            }
        }
    }

    if skipped_operations > 0 {
        warn!(
            height = height,
            skipped = skipped_operations;
            "Skipped malformed operations while decoding block"
        );
    }

    Ok(Block {
        height,
        hash: raw.block_id,
        previous_hash: raw.previous,
        timestamp,
        transfer_events,
        skipped_operations,
    })
}

/// `["<type>", {"from", "to", "amount": "<decimal> <tag>", "memo"}]`
fn decode_operation(op: &Value, transaction_id: &str, operation_index: u64) -> Option<TransferEvent> {
    let pair = op.as_array()?;
    let op_type = pair.first()?.as_str()?;
    let params = pair.get(1)?.as_object()?;

    let (amount, currency_tag) = split_asset(params.get("amount")?.as_str()?).ok()?;
    let from = params.get("from")?.as_str()?;
    let to = params.get("to")?.as_str()?;
    let memo = params.get("memo").and_then(Value::as_str).unwrap_or_default();

    Some(TransferEvent {
        op_type: op_type.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        amount: amount.to_string(),
        currency_tag: currency_tag.to_string(),
        memo: memo.to_string(),
        transaction_id: transaction_id.to_string(),
        operation_index,
    })
}
