use log::debug;
use rusqlite::{Connection, OptionalExtension, named_params};

use crate::{db::WalletDbResult, models::ScanCursor};

pub fn get_scan_cursor(conn: &Connection, symbol: &str) -> WalletDbResult<Option<ScanCursor>> {
    let mut stmt = conn.prepare_cached("SELECT height, hash FROM scan_cursor WHERE symbol = :symbol")?;
    let cursor = stmt
        .query_row(named_params! { ":symbol": symbol }, |r| {
            let height: i64 = r.get(0)?;
            Ok(ScanCursor {
                height: height as u64,
                hash: r.get(1)?,
            })
        })
        .optional()?;
    Ok(cursor)
}

pub fn upsert_scan_cursor(conn: &Connection, symbol: &str, cursor: &ScanCursor) -> WalletDbResult<()> {
    debug!(symbol = symbol, height = cursor.height; "DB: Saving scan cursor");

    conn.execute(
        r#"
        INSERT INTO scan_cursor (symbol, height, hash, updated_at)
        VALUES (:symbol, :height, :hash, datetime('now'))
        ON CONFLICT(symbol) DO UPDATE SET
            height = excluded.height,
            hash = excluded.hash,
            updated_at = excluded.updated_at
        "#,
        named_params! {
            ":symbol": symbol,
            ":height": cursor.height as i64,
            ":hash": cursor.hash,
        },
    )?;
    Ok(())
}
