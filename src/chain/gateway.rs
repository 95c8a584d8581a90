use async_trait::async_trait;

use super::types::{AccountBalance, Block, BroadcastResult, BroadcastTransaction, ChainHead};
use crate::http::NodeError;

/// Typed view of the node used by the scanner and the transaction builder.
///
/// Implementations are expected to bound their own outbound concurrency.
#[async_trait]
pub trait NodeGateway: Send + Sync {
    async fn get_chain_head(&self) -> Result<ChainHead, NodeError>;

    async fn get_block(&self, height: u64) -> Result<Block, NodeError>;

    /// Balance of an on-chain account, split into amount and currency tag.
    async fn get_balance(&self, alias: &str) -> Result<AccountBalance, NodeError>;

    async fn broadcast(&self, tx: &BroadcastTransaction) -> Result<BroadcastResult, NodeError>;
}
