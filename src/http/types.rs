use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// `database_api.get_dynamic_global_properties` result (only the fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiHeadBlock {
    pub head_block_number: u64,
    pub head_block_id: String,
    pub last_irreversible_block_num: u64,
}

/// One entry of `database_api.get_accounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiAccount {
    pub name: String,
    /// `"<decimal> <tag>"`, e.g. `"12.50000000 PIA"`.
    pub balance: String,
}

/// `network_broadcast_api.broadcast_transaction_synchronous` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiTransResult {
    pub id: String,
    #[serde(default)]
    pub block_num: u64,
    #[serde(default)]
    pub trx_num: u32,
    #[serde(default)]
    pub expired: bool,
}
