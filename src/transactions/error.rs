use thiserror::Error;

use crate::{
    chain::{AssetError, DecodeError},
    db::WalletDbError,
    http::NodeError,
    transactions::{codec::CodecError, signer::SignerError},
};

/// Failures of building, signing, verifying or submitting a raw transaction.
///
/// None of these are retried internally.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The source account is not registered locally.
    #[error("Account {0} not found")]
    AccountNotFound(String),

    /// A balance lookup for the account failed or returned a foreign currency.
    #[error("Account {alias} is not on chain: {reason}")]
    AccountNotOnChain { alias: String, reason: String },

    #[error("Balance {balance} is not enough to send {amount}")]
    InsufficientBalance { balance: String, amount: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AssetError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The account has no signing addresses.
    #[error("Account {0} has no public key")]
    NoAddresses(String),

    #[error("Transaction signature is empty")]
    SignatureEmpty,

    /// A signature could not be produced or parsed.
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    /// A signature did not verify against its address's public key.
    #[error("Transaction verify failed for {address}: {reason}")]
    VerifyFailed { address: String, reason: String },

    /// The node already has this transaction.
    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),

    #[error("Raw transaction hex is invalid: {0}")]
    InvalidRawHex(#[from] hex::FromHexError),

    #[error("Node error: {0}")]
    Node(NodeError),

    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Block decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Database error: {0}")]
    Db(#[from] WalletDbError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
}

impl From<NodeError> for TransactionError {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::DuplicateTransaction(message) => TransactionError::DuplicateSubmission(message),
            other => TransactionError::Node(other),
        }
    }
}
