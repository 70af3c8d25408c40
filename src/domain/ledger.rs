//! Balance snapshots, transfer audit records and the transfer arithmetic.

use chrono::{DateTime, Utc};

use super::{Asset, AssetMap, UserId};

/// Amount held per asset.
pub type Balances = AssetMap<f64>;

/// One append-only ledger row. The latest row per user is that user's
/// current balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceSnapshot {
    /// Owner of the balances.
    pub user_id: UserId,
    /// Insert time.
    pub taken_at: DateTime<Utc>,
    /// Amount per asset.
    pub balances: Balances,
}

/// A transfer about to be recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewTransfer {
    /// Sender.
    pub from: UserId,
    /// Recipient.
    pub to: UserId,
    /// Transferred asset.
    pub asset: Asset,
    /// Transferred amount, strictly positive.
    pub amount: f64,
}

/// An immutable audit record of a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferRecord {
    /// Storage-assigned id.
    pub id: i64,
    /// Sender.
    pub from: UserId,
    /// Recipient.
    pub to: UserId,
    /// Transferred asset.
    pub asset: Asset,
    /// Transferred amount.
    pub amount: f64,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

/// The sender holds less of the asset than requested.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("insufficient balance: {available} {asset} available, {requested} requested")]
pub struct InsufficientBalance {
    /// Requested asset.
    pub asset: Asset,
    /// Sender's holding.
    pub available: f64,
    /// Requested amount.
    pub requested: f64,
}

/// Whether every amount is finite and non-negative.
#[must_use]
pub fn is_well_formed(balances: &Balances) -> bool {
    balances.iter().all(|(_, v)| v.is_finite() && *v >= 0.0)
}

/// Moves `amount` of `asset` from `sender` to `recipient`.
///
/// Every other asset is carried forward unchanged. Returns the new
/// `(sender, recipient)` balances.
///
/// # Errors
///
/// Returns [`InsufficientBalance`] when the sender holds less than `amount`.
pub fn apply_transfer(
    sender: &Balances,
    recipient: &Balances,
    asset: Asset,
    amount: f64,
) -> Result<(Balances, Balances), InsufficientBalance> {
    let available = *sender.get(asset);
    if available < amount {
        return Err(InsufficientBalance {
            asset,
            available,
            requested: amount,
        });
    }

    let mut sender_after = *sender;
    let mut recipient_after = *recipient;
    *sender_after.get_mut(asset) -= amount;
    *recipient_after.get_mut(asset) += amount;
    Ok((sender_after, recipient_after))
}
