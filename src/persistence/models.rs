//! Row shapes of the `rates`, `balances`, `sessions` and `transfers` tables
//! and their mapping to domain types.

use chrono::{DateTime, Utc};

use super::PersistenceError;
use crate::domain::{
    Asset, AssetMap, BalanceSnapshot, RateSnapshot, Session, Tag, TransferRecord, User, UserId,
};

/// `(upd_date, usdt, btc, eth, sol, trx, ton, blink)` from `rates`.
pub type RatesRow = (DateTime<Utc>, f64, f64, f64, f64, f64, f64, f64);

/// `(user_id, upd_date, usdt_balance, …, blink_balance)` from `balances`.
pub type BalanceRow = (i64, DateTime<Utc>, f64, f64, f64, f64, f64, f64, f64);

/// `(user_id, name, tag)` from `users`.
pub type UserRow = (i64, String, Option<String>);

/// `(token, user_id, created_at, expires_at)` from `sessions`.
pub type SessionRow = (String, i64, DateTime<Utc>, DateTime<Utc>);

/// `(id, from_user_id, to_user_id, symbol, amount, date)` from `transfers`.
pub type TransferRow = (i64, i64, i64, String, f64, DateTime<Utc>);

fn user_id(raw: i64) -> Result<UserId, PersistenceError> {
    UserId::new(raw).ok_or_else(|| PersistenceError::CorruptRow(format!("user id {raw}")))
}

/// Maps a `rates` row.
#[must_use]
pub fn rate_snapshot((taken_at, usdt, btc, eth, sol, trx, ton, blink): RatesRow) -> RateSnapshot {
    RateSnapshot {
        taken_at,
        prices: AssetMap {
            usdt,
            btc,
            eth,
            sol,
            trx,
            ton,
            blink,
        },
    }
}

/// Maps a `balances` row.
///
/// # Errors
///
/// Returns [`PersistenceError::CorruptRow`] for a non-positive user id.
pub fn balance_snapshot(
    (id, taken_at, usdt, btc, eth, sol, trx, ton, blink): BalanceRow,
) -> Result<BalanceSnapshot, PersistenceError> {
    Ok(BalanceSnapshot {
        user_id: user_id(id)?,
        taken_at,
        balances: AssetMap {
            usdt,
            btc,
            eth,
            sol,
            trx,
            ton,
            blink,
        },
    })
}

/// Maps a `users` row. Empty tags are treated as unset.
///
/// # Errors
///
/// Returns [`PersistenceError::CorruptRow`] for a non-positive user id.
pub fn user((id, name, tag): UserRow) -> Result<User, PersistenceError> {
    Ok(User {
        id: user_id(id)?,
        name,
        tag: tag.filter(|t| !t.is_empty()).map(Tag::from_stored),
    })
}

/// Maps a `sessions` row.
///
/// # Errors
///
/// Returns [`PersistenceError::CorruptRow`] for a non-positive user id.
pub fn session(
    (token, id, created_at, expires_at): SessionRow,
) -> Result<Session, PersistenceError> {
    Ok(Session {
        token,
        user_id: user_id(id)?,
        created_at,
        expires_at,
    })
}

/// Maps a `transfers` row.
///
/// # Errors
///
/// Returns [`PersistenceError::CorruptRow`] for a bad user id or symbol.
pub fn transfer_record(
    (id, from, to, symbol, amount, created_at): TransferRow,
) -> Result<TransferRecord, PersistenceError> {
    let asset: Asset = symbol
        .parse()
        .map_err(|e: crate::domain::UnknownAsset| PersistenceError::CorruptRow(e.to_string()))?;
    Ok(TransferRecord {
        id,
        from: user_id(from)?,
        to: user_id(to)?,
        asset,
        amount,
        created_at,
    })
}
