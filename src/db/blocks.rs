use rusqlite::{Connection, OptionalExtension, named_params};

use crate::{db::WalletDbResult, models::BlockHeader};

/// Stores the header of a block accepted as canonical, replacing any earlier record at that height.
pub fn upsert_block(conn: &Connection, header: &BlockHeader) -> WalletDbResult<()> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO blocks (symbol, height, hash, previous_hash, block_time, fork)
        VALUES (:symbol, :height, :hash, :previous_hash, :block_time, :fork)
        "#,
        named_params! {
            ":symbol": header.symbol,
            ":height": header.height as i64,
            ":hash": header.hash,
            ":previous_hash": header.previous_hash,
            ":block_time": header.time as i64,
            ":fork": header.fork,
        },
    )?;
    Ok(())
}

pub fn get_block_by_height(conn: &Connection, symbol: &str, height: u64) -> WalletDbResult<Option<BlockHeader>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT symbol, height, hash, previous_hash, block_time, fork
        FROM blocks
        WHERE symbol = :symbol AND height = :height
        "#,
    )?;

    let header = stmt
        .query_row(named_params! { ":symbol": symbol, ":height": height as i64 }, |r| {
            let height: i64 = r.get(1)?;
            let time: i64 = r.get(4)?;
            Ok(BlockHeader {
                symbol: r.get(0)?,
                height: height as u64,
                hash: r.get(2)?,
                previous_hash: r.get(3)?,
                time: time as u64,
                fork: r.get(5)?,
            })
        })
        .optional()?;
    Ok(header)
}
