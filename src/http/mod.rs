//! JSON-RPC client for PIA nodes.
//!
//! This module provides the concrete [`NodeGateway`](crate::chain::NodeGateway)
//! used by the scanner and the transaction builder.
//!
//! # Architecture
//!
//! - **[`PiaNodeClient`]**: Maps the gateway calls onto node API methods
//! - **`HttpClient`** (internal): JSON-RPC framing, retries and request limiting
//! - **[`NodeError`]**: Transport, RPC and payload failures
//!
//! # Retry Behavior
//!
//! Read calls go through [`reqwest_retry`]'s exponential backoff on transient
//! HTTP errors (connection failures, 5xx responses). Broadcasts are sent once.
//!
//! # Request Limiting
//!
//! Every call acquires a permit from a shared semaphore sized by
//! [`HttpClientConfig::max_concurrent_requests`]. The default of one permit
//! keeps calls to the node strictly sequential.
//!
//! # Example
//!
//! ```ignore
//! use pia_wallet::{chain::NodeGateway, http::PiaNodeClient};
//!
//! let client = PiaNodeClient::new("http://127.0.0.1:8090".parse()?)?;
//! let head = client.get_chain_head().await?;
//! println!("Node is at height {}", head.height);
//! ```

mod error;
mod http_client;
mod node_client;
mod types;

pub use error::NodeError;
pub use http_client::HttpClientConfig;
pub use node_client::PiaNodeClient;
