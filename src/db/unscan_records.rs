use log::debug;
use rusqlite::{Connection, named_params};

use crate::{db::WalletDbResult, models::UnscanRecord};

/// Records a failed block or transaction. Re-recording the same height/transaction keeps one row.
pub fn insert_unscan_record(conn: &Connection, symbol: &str, record: &UnscanRecord) -> WalletDbResult<()> {
    debug!(
        symbol = symbol,
        height = record.block_height,
        reason = record.reason.as_str();
        "DB: Saving unscan record"
    );

    conn.execute(
        r#"
        INSERT OR REPLACE INTO unscan_records (id, symbol, block_height, tx_id, reason, created_at)
        VALUES (:id, :symbol, :block_height, :tx_id, :reason, datetime('now'))
        "#,
        named_params! {
            ":id": record.id,
            ":symbol": symbol,
            ":block_height": record.block_height as i64,
            ":tx_id": record.tx_id,
            ":reason": record.reason,
        },
    )?;
    Ok(())
}

pub fn delete_unscan_records_by_height(conn: &Connection, symbol: &str, height: u64) -> WalletDbResult<usize> {
    let count = conn.execute(
        "DELETE FROM unscan_records WHERE symbol = :symbol AND block_height = :height",
        named_params! { ":symbol": symbol, ":height": height as i64 },
    )?;
    Ok(count)
}

pub fn get_unscan_records(conn: &Connection, symbol: &str) -> WalletDbResult<Vec<UnscanRecord>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT id, block_height, tx_id, reason
        FROM unscan_records
        WHERE symbol = :symbol
        ORDER BY block_height ASC
        "#,
    )?;

    let rows = stmt.query_map(named_params! { ":symbol": symbol }, |r| {
        let height: i64 = r.get(1)?;
        Ok(UnscanRecord {
            id: r.get(0)?,
            block_height: height as u64,
            tx_id: r.get(2)?,
            reason: r.get(3)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
