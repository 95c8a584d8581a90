//! Chain-level types shared by the node client, the scanner and the transaction builder.
//!
//! # Key Types
//!
//! - [`ChainHead`] - Node head with the derived reference block number
//! - [`Block`] - Decoded block with its flattened [`TransferEvent`]s
//! - [`Asset`] - Integer amount plus precision and currency tag
//! - [`NodeGateway`] - Async trait over the node's read and broadcast calls

pub mod asset;
mod decode;
mod gateway;
mod types;

pub use asset::{Asset, AssetError};
pub use decode::{ApiBlock, ApiTransaction, DecodeError, decode_block, format_chain_time, parse_chain_time};
pub use gateway::NodeGateway;
pub use types::{
    AccountBalance, Block, BroadcastOperation, BroadcastResult, BroadcastTransaction, ChainHead, TransferEvent,
    TransferParams, ref_block_num,
};
