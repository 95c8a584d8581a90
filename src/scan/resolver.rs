use async_trait::async_trait;

/// Maps an on-chain alias to the key of the locally tracked account that owns it.
#[async_trait]
pub trait ScanTargetResolver: Send + Sync {
    /// `Ok(None)` means the alias is not tracked.
    async fn resolve(&self, alias: &str) -> anyhow::Result<Option<String>>;
}
