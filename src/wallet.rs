//! Wires configuration, storage and the node client into the wallet's services.

use std::sync::Arc;

use anyhow::Context;
use log::info;
use url::Url;

use crate::{
    accounts::SqliteAccountRegistry,
    config::WalletConfig,
    db::{SqlitePool, init_db},
    http::PiaNodeClient,
    scan::{BlockScanner, EventSender, SqliteScanStore, TransferExtractor},
    transactions::{Secp256k1Signer, TransactionDecoder, TransactionError},
};

/// Shared handles for one wallet database and one node.
#[derive(Clone)]
pub struct WalletContext {
    pub config: WalletConfig,
    pub pool: SqlitePool,
    pub gateway: Arc<PiaNodeClient>,
    pub registry: Arc<SqliteAccountRegistry>,
}

impl WalletContext {
    pub fn open(config: WalletConfig) -> anyhow::Result<Self> {
        let pool = init_db(&config.database_path)
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

        let base_url = Url::parse(&config.base_url).with_context(|| format!("Invalid base_url {}", config.base_url))?;
        let gateway = Arc::new(PiaNodeClient::with_config(base_url, &config.http_client_config())?);
        let registry = Arc::new(SqliteAccountRegistry::new(pool.clone()));

        info!(
            symbol = config.symbol.as_str(),
            node = config.base_url.as_str();
            "Wallet context ready"
        );
        Ok(Self {
            config,
            pool,
            gateway,
            registry,
        })
    }

    pub fn scanner<E: EventSender>(&self, event_sender: E) -> BlockScanner<E> {
        let extractor = TransferExtractor::new(&self.config.symbol, self.config.decimals, &self.config.fee_string)
            .with_resolver(self.registry.clone())
            .max_extracting_size(self.config.max_extracting_size);

        BlockScanner::new(
            &self.config.symbol,
            self.config.decimals,
            self.gateway.clone(),
            Arc::new(SqliteScanStore::new(self.pool.clone(), &self.config.symbol)),
            extractor,
            event_sender,
        )
    }

    pub fn transaction_decoder(&self) -> Result<TransactionDecoder, TransactionError> {
        TransactionDecoder::new(
            &self.config,
            self.gateway.clone(),
            self.registry.clone(),
            Arc::new(Secp256k1Signer::new()),
        )
    }
}
