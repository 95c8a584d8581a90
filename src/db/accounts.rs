use log::debug;
use rusqlite::{Connection, OptionalExtension, named_params};
use serde::{Deserialize, Serialize};

use crate::db::{WalletDbError, WalletDbResult};

/// A locally tracked account, identified on chain by its alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: String,
    pub alias: String,
}

/// A signing address owned by an account. Multi-signature accounts have several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRow {
    pub address: String,
    pub account_id: String,
    /// Compressed secp256k1 public key, hex encoded.
    pub public_key: String,
    pub hd_path: String,
}

pub fn create_account(conn: &Connection, account_id: &str, alias: &str) -> WalletDbResult<()> {
    debug!(account_id = account_id; "DB: Creating account");

    let result = conn.execute(
        r#"
        INSERT INTO accounts (account_id, alias)
        VALUES (:account_id, :alias)
        "#,
        named_params! {
            ":account_id": account_id,
            ":alias": alias,
        },
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => Err(
            WalletDbError::DuplicateEntry(format!("account {} or alias {} already exists", account_id, alias)),
        ),
        Err(e) => Err(e.into()),
    }
}

pub fn get_account_by_id(conn: &Connection, account_id: &str) -> WalletDbResult<Option<AccountRow>> {
    let mut stmt = conn.prepare_cached("SELECT account_id, alias FROM accounts WHERE account_id = :account_id")?;
    let row = stmt
        .query_row(named_params! { ":account_id": account_id }, |r| {
            Ok(AccountRow {
                account_id: r.get(0)?,
                alias: r.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn get_account_by_alias(conn: &Connection, alias: &str) -> WalletDbResult<Option<AccountRow>> {
    let mut stmt = conn.prepare_cached("SELECT account_id, alias FROM accounts WHERE alias = :alias")?;
    let row = stmt
        .query_row(named_params! { ":alias": alias }, |r| {
            Ok(AccountRow {
                account_id: r.get(0)?,
                alias: r.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn insert_address(conn: &Connection, address: &AddressRow) -> WalletDbResult<()> {
    debug!(account_id = address.account_id.as_str(); "DB: Inserting account address");

    conn.execute(
        r#"
        INSERT OR REPLACE INTO account_addresses (address, account_id, public_key, hd_path)
        VALUES (:address, :account_id, :public_key, :hd_path)
        "#,
        named_params! {
            ":address": address.address,
            ":account_id": address.account_id,
            ":public_key": address.public_key,
            ":hd_path": address.hd_path,
        },
    )?;
    Ok(())
}

pub fn get_addresses(conn: &Connection, account_id: &str) -> WalletDbResult<Vec<AddressRow>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT address, account_id, public_key, hd_path
        FROM account_addresses
        WHERE account_id = :account_id
        ORDER BY created_at ASC, address ASC
        "#,
    )?;

    let rows = stmt.query_map(named_params! { ":account_id": account_id }, |r| {
        Ok(AddressRow {
            address: r.get(0)?,
            account_id: r.get(1)?,
            public_key: r.get(2)?,
            hd_path: r.get(3)?,
        })
    })?;

    let mut addresses = Vec::new();
    for row in rows {
        addresses.push(row?);
    }
    Ok(addresses)
}
