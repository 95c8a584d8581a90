use std::{env::current_dir, path::Path, time::Duration};

use include_dir::{Dir, include_dir};
use log::debug;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::Migrations;

mod error;
pub use error::{WalletDbError, WalletDbResult};

mod accounts;
pub use accounts::{AccountRow, AddressRow, create_account, get_account_by_alias, get_account_by_id, get_addresses, insert_address};

mod scan_cursor;
pub use scan_cursor::{get_scan_cursor, upsert_scan_cursor};

mod blocks;
pub use blocks::{get_block_by_height, upsert_block};

mod unscan_records;
pub use unscan_records::{delete_unscan_records_by_height, get_unscan_records, insert_unscan_record};

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Opens (creating if needed) the wallet database and brings its schema up to date.
pub fn init_db(db_path: impl AsRef<Path>) -> WalletDbResult<SqlitePool> {
    let mut path = db_path.as_ref().to_path_buf();
    if path.is_relative() {
        path = current_dir()?.join(path);
    }
    let parent = path
        .parent()
        .ok_or_else(|| WalletDbError::InvalidInput("Invalid database file path".to_string()))?;
    std::fs::create_dir_all(parent)?;

    debug!(path:% = path.display(); "DB: Opening wallet database");

    let manager = SqliteConnectionManager::file(&path).with_init(|c| {
        c.execute_batch("PRAGMA foreign_keys = ON;")?;
        c.busy_timeout(Duration::from_secs(5))
    });
    let pool = r2d2::Pool::builder().max_size(5).build(manager)?;

    let migrations = Migrations::from_directory(&MIGRATIONS_DIR)?;
    let mut conn = pool.get()?;
    migrations.to_latest(&mut conn)?;

    Ok(pool)
}
