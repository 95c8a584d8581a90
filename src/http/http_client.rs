use std::{sync::Arc, time::Duration};

use log::trace;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use url::Url;

use super::{
    error::NodeError,
    types::{JsonRpcRequest, JsonRpcResponse},
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1;

/// Settings for the JSON-RPC transport.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub max_retries: u32,
    pub timeout: Duration,
    /// Upper bound on requests in flight at once. `1` serializes all calls.
    pub max_concurrent_requests: usize,
    /// Pause before every request, taken after acquiring a request slot.
    pub request_delay: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_delay: Duration::ZERO,
        }
    }
}

pub(crate) struct HttpClient {
    base_url: Url,
    client: reqwest_middleware::ClientWithMiddleware,
    no_retry_client: reqwest_middleware::ClientWithMiddleware,
    limiter: Arc<Semaphore>,
    request_delay: Duration,
}

impl HttpClient {
    pub fn with_config(base_url: Url, config: &HttpClientConfig) -> Result<Self, anyhow::Error> {
        let retry_policy =
            reqwest_retry::policies::ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

        let inner_client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let client = reqwest_middleware::ClientBuilder::new(inner_client.clone())
            .with(reqwest_retry::RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let no_retry_client = reqwest_middleware::ClientBuilder::new(inner_client).build();

        Ok(Self {
            base_url,
            client,
            no_retry_client,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            request_delay: config.request_delay,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Calls `api.method(args)` through the node's `call` dispatcher.
    ///
    /// Transient HTTP failures are retried by the middleware unless `retry` is false.
    pub async fn call<T: DeserializeOwned>(
        &self,
        api: &str,
        method: &str,
        args: Value,
        retry: bool,
    ) -> Result<T, NodeError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| NodeError::UnexpectedResult(format!("request limiter closed: {}", e)))?;

        // Held under the permit so queued callers stay spaced apart.
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "call",
            params: json!([api, method, args]),
        };
        trace!(api = api, method = method; "Sending node request");

        let http = if retry { &self.client } else { &self.no_retry_client };
        let resp = http
            .post(self.base_url.clone())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&request)?)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        let parsed: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => return Err(NodeError::ServerError { status, body }),
        };

        if let Some(err) = parsed.error {
            return Err(NodeError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        if !status.is_success() {
            return Err(NodeError::ServerError { status, body });
        }

        let result = parsed.result.ok_or(NodeError::EmptyResponse)?;
        Ok(serde_json::from_value(result)?)
    }
}
