use thiserror::Error;

use crate::{
    chain::{AssetError, DecodeError},
    db::WalletDbError,
    http::NodeError,
};

/// Errors that end a scan session, plus the aggregate extraction signal.
///
/// Every variant is scoped to one session. The daemon logs it and starts a
/// fresh session on its next tick.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The node could not be reached or answered with an error.
    #[error("Network error: {0}")]
    Network(NodeError),

    /// A fetched block could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// DB execution failed
    #[error("Database execution error: {0}")]
    Db(#[from] WalletDbError),

    /// Some events of one block could not be extracted or delivered.
    ///
    /// The failures are already recorded as unscan records. Successful events were delivered.
    #[error("Extraction of block {height} had {failed} failed event(s) out of {total}")]
    ExtractionFailed { height: u64, failed: usize, total: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A background task died.
    #[error("Fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl From<NodeError> for ScanError {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::Decode(e) => ScanError::Decode(e),
            other => ScanError::Network(other),
        }
    }
}

/// Why a single transfer event could not be turned into ledger records.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No scan target resolver is configured")]
    NoResolver,

    #[error("Resolving {alias} failed: {reason}")]
    Resolve { alias: String, reason: String },

    #[error("Invalid transfer amount: {0}")]
    InvalidAmount(#[from] AssetError),

    #[error("Extraction task ended without a result")]
    TaskLost,
}

/// Per-block outcome of the extraction pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}
