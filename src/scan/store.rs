use async_trait::async_trait;
use log::error;

use crate::{
    db::{
        SqlitePool, WalletDbError, WalletDbResult, delete_unscan_records_by_height, get_block_by_height,
        get_scan_cursor, insert_unscan_record, upsert_block, upsert_scan_cursor,
    },
    models::{BlockHeader, ScanCursor, UnscanRecord},
};

/// Persistent scan progress. Written only by the scan loop and the extraction collector.
#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn load_cursor(&self) -> WalletDbResult<Option<ScanCursor>>;

    async fn save_cursor(&self, cursor: &ScanCursor) -> WalletDbResult<()>;

    async fn load_block(&self, height: u64) -> WalletDbResult<Option<BlockHeader>>;

    async fn save_block(&self, header: &BlockHeader) -> WalletDbResult<()>;

    async fn save_unscan_record(&self, record: &UnscanRecord) -> WalletDbResult<()>;

    /// Removes every unscan record at `height`, returning how many were removed.
    async fn delete_unscan_records(&self, height: u64) -> WalletDbResult<usize>;
}

/// [`ScanStore`] over the wallet SQLite database, scoped to one currency symbol.
///
/// Every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteScanStore {
    pool: SqlitePool,
    symbol: String,
}

impl SqliteScanStore {
    pub fn new(pool: SqlitePool, symbol: &str) -> Self {
        Self {
            pool,
            symbol: symbol.to_string(),
        }
    }

    async fn run<T, F>(&self, task: &'static str, f: F) -> WalletDbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection, &str) -> WalletDbResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let symbol = self.symbol.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn, &symbol)
        })
        .await
        .map_err(|e| {
            error!(task = task, error:% = e; "Scan store task failed");
            WalletDbError::Unexpected(format!("{} task failed: {}", task, e))
        })?
    }
}

#[async_trait]
impl ScanStore for SqliteScanStore {
    async fn load_cursor(&self) -> WalletDbResult<Option<ScanCursor>> {
        self.run("load_cursor", |conn, symbol| get_scan_cursor(conn, symbol))
            .await
    }

    async fn save_cursor(&self, cursor: &ScanCursor) -> WalletDbResult<()> {
        let cursor = cursor.clone();
        self.run("save_cursor", move |conn, symbol| upsert_scan_cursor(conn, symbol, &cursor))
            .await
    }

    async fn load_block(&self, height: u64) -> WalletDbResult<Option<BlockHeader>> {
        self.run("load_block", move |conn, symbol| get_block_by_height(conn, symbol, height))
            .await
    }

    async fn save_block(&self, header: &BlockHeader) -> WalletDbResult<()> {
        let header = header.clone();
        self.run("save_block", move |conn, _| upsert_block(conn, &header)).await
    }

    async fn save_unscan_record(&self, record: &UnscanRecord) -> WalletDbResult<()> {
        let record = record.clone();
        self.run("save_unscan_record", move |conn, symbol| {
            insert_unscan_record(conn, symbol, &record)
        })
        .await
    }

    async fn delete_unscan_records(&self, height: u64) -> WalletDbResult<usize> {
        self.run("delete_unscan_records", move |conn, symbol| {
            delete_unscan_records_by_height(conn, symbol, height)
        })
        .await
    }
}
