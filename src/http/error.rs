//! Error types for node gateway operations.
//!
//! This module defines the [`NodeError`] enum which encompasses all possible
//! failure modes when communicating with a PIA node over JSON-RPC.

use thiserror::Error;

use crate::chain::DecodeError;

/// Errors that can occur while talking to the node.
///
/// Every variant except [`DuplicateTransaction`](NodeError::DuplicateTransaction)
/// is treated by the scanner as a transient failure: the current scan session
/// ends and the scheduler starts a new one later.
///
/// # Error Categories
///
/// - **Network errors**: [`RequestFailed`](NodeError::RequestFailed),
///   [`MiddlewareError`](NodeError::MiddlewareError)
/// - **Server errors**: [`ServerError`](NodeError::ServerError), [`Rpc`](NodeError::Rpc),
///   [`EmptyResponse`](NodeError::EmptyResponse)
/// - **Payload errors**: [`JsonError`](NodeError::JsonError), [`Decode`](NodeError::Decode),
///   [`UnexpectedResult`](NodeError::UnexpectedResult)
#[derive(Debug, Error)]
pub enum NodeError {
    /// The HTTP request failed due to a network or connection error.
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// An error occurred in the HTTP middleware layer.
    ///
    /// This may indicate that all retry attempts have been exhausted.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// The server returned a non-success HTTP status code without a JSON-RPC error body.
    #[error("Server error {status}: {body}")]
    ServerError {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error [{code}] {message}")]
    Rpc { code: i64, message: String },

    /// The node answered without either a `result` or an `error`.
    #[error("Response is empty")]
    EmptyResponse,

    /// The `result` had an unexpected shape.
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),

    /// The queried account does not exist on chain.
    #[error("Account {0} not found on chain")]
    AccountNotFound(String),

    /// The node already knows this transaction. Resubmitting will not help.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Failed to serialize or deserialize JSON data.
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A fetched block could not be decoded.
    #[error("Block decode error: {0}")]
    Decode(#[from] DecodeError),
}
