use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use url::Url;

use super::{
    error::NodeError,
    http_client::{HttpClient, HttpClientConfig},
    types::{ApiAccount, ApiHeadBlock, ApiTransResult},
};
use crate::chain::{
    AccountBalance, ApiBlock, Block, BroadcastResult, BroadcastTransaction, ChainHead, NodeGateway, asset::split_asset,
    decode_block,
};

const DATABASE_API: &str = "database_api";
const BROADCAST_API: &str = "network_broadcast_api";

/// [`NodeGateway`] backed by a PIA node's JSON-RPC endpoint.
pub struct PiaNodeClient {
    http_client: HttpClient,
}

impl PiaNodeClient {
    pub fn new(base_url: Url) -> Result<Self, anyhow::Error> {
        Self::with_config(base_url, &HttpClientConfig::default())
    }

    pub fn with_config(base_url: Url, config: &HttpClientConfig) -> Result<Self, anyhow::Error> {
        Ok(Self {
            http_client: HttpClient::with_config(base_url, config)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        self.http_client.base_url()
    }
}

#[async_trait]
impl NodeGateway for PiaNodeClient {
    async fn get_chain_head(&self) -> Result<ChainHead, NodeError> {
        let head: ApiHeadBlock = self
            .http_client
            .call(DATABASE_API, "get_dynamic_global_properties", json!([]), true)
            .await?;

        Ok(ChainHead {
            height: head.head_block_number,
            block_id: head.head_block_id,
            last_irreversible_height: head.last_irreversible_block_num,
        })
    }

    async fn get_block(&self, height: u64) -> Result<Block, NodeError> {
        let raw: ApiBlock = self
            .http_client
            .call(DATABASE_API, "get_block", json!([height]), true)
            .await?;

        Ok(decode_block(raw, height)?)
    }

    async fn get_balance(&self, alias: &str) -> Result<AccountBalance, NodeError> {
        let accounts: Vec<ApiAccount> = self
            .http_client
            .call(DATABASE_API, "get_accounts", json!([[alias]]), true)
            .await?;

        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::AccountNotFound(alias.to_string()))?;
        let (amount, currency_tag) = split_asset(&account.balance)
            .map_err(|e| NodeError::UnexpectedResult(format!("balance of {}: {}", account.name, e)))?;

        Ok(AccountBalance {
            alias: account.name.clone(),
            amount: amount.to_string(),
            currency_tag: currency_tag.to_string(),
        })
    }

    async fn broadcast(&self, tx: &BroadcastTransaction) -> Result<BroadcastResult, NodeError> {
        debug!(
            ref_block_num = tx.ref_block_num,
            expiration = tx.expiration.as_str();
            "Broadcasting transaction"
        );

        // Never retried: a resend after a lost response looks like a duplicate to the node.
        let result: Result<ApiTransResult, NodeError> = self
            .http_client
            .call(BROADCAST_API, "broadcast_transaction_synchronous", json!([tx]), false)
            .await;

        match result {
            Ok(res) => Ok(BroadcastResult {
                id: res.id,
                block_num: res.block_num,
                trx_num: res.trx_num,
                expired: res.expired,
            }),
            Err(NodeError::Rpc { code, message }) if message.to_lowercase().contains("duplicate") => {
                warn!(code = code; "Node rejected broadcast as duplicate");
                Err(NodeError::DuplicateTransaction(message))
            },
            Err(e) => Err(e),
        }
    }
}
