//! Locally tracked accounts.
//!
//! [`SqliteAccountRegistry`] answers alias lookups for the extraction pipeline
//! and account/address lookups for the transaction builder. Every query runs
//! on the blocking pool so the async scanner never holds a SQLite connection
//! across an await point.

use anyhow::anyhow;
use async_trait::async_trait;
use log::{error, info};

use crate::{
    db::{
        AccountRow, AddressRow, SqlitePool, WalletDbError, WalletDbResult, create_account, get_account_by_alias,
        get_account_by_id, get_addresses, insert_address,
    },
    log::mask_string,
    scan::ScanTargetResolver,
    transactions::AccountStore,
};

#[derive(Clone)]
pub struct SqliteAccountRegistry {
    pool: SqlitePool,
}

impl SqliteAccountRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, task: &'static str, f: F) -> WalletDbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> WalletDbResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            error!(task = task, error:% = e; "Account registry task failed");
            WalletDbError::Unexpected(format!("{} task failed: {}", task, e))
        })?
    }

    /// Registers an account and, when given, its first signing key.
    pub async fn register_account(
        &self,
        account_id: &str,
        alias: &str,
        public_key: Option<&str>,
    ) -> WalletDbResult<AccountRow> {
        let account = AccountRow {
            account_id: account_id.to_string(),
            alias: alias.to_string(),
        };
        let address = public_key.map(|key| AddressRow {
            address: alias.to_string(),
            account_id: account_id.to_string(),
            public_key: key.to_string(),
            hd_path: String::new(),
        });

        let row = account.clone();
        self.run("register_account", move |conn| {
            let tx = conn.unchecked_transaction()?;
            create_account(&tx, &row.account_id, &row.alias)?;
            if let Some(address) = &address {
                insert_address(&tx, address)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

        info!(account_id = account_id, alias:% = mask_string(alias); "Account registered");
        Ok(account)
    }

    pub async fn add_address(&self, address: AddressRow) -> WalletDbResult<()> {
        self.run("add_address", move |conn| insert_address(conn, &address)).await
    }

    pub async fn account_by_alias(&self, alias: &str) -> WalletDbResult<Option<AccountRow>> {
        let alias = alias.to_string();
        self.run("account_by_alias", move |conn| get_account_by_alias(conn, &alias))
            .await
    }
}

#[async_trait]
impl ScanTargetResolver for SqliteAccountRegistry {
    async fn resolve(&self, alias: &str) -> anyhow::Result<Option<String>> {
        let account = self
            .account_by_alias(alias)
            .await
            .map_err(|e| anyhow!("account lookup failed: {}", e))?;
        Ok(account.map(|a| a.account_id))
    }
}

#[async_trait]
impl AccountStore for SqliteAccountRegistry {
    async fn account(&self, account_id: &str) -> WalletDbResult<Option<AccountRow>> {
        let account_id = account_id.to_string();
        self.run("account", move |conn| get_account_by_id(conn, &account_id))
            .await
    }

    async fn addresses(&self, account_id: &str) -> WalletDbResult<Vec<AddressRow>> {
        let account_id = account_id.to_string();
        self.run("addresses", move |conn| get_addresses(conn, &account_id)).await
    }
}
