//! Peer-to-peer transfers between user ledgers.
//!
//! A transfer runs `validate -> resolve recipient -> begin -> load both ->
//! check sufficiency -> compute -> persist both rows and the audit record
//! -> commit`. Any failure after `begin` drops the transaction, which
//! discards every write made inside it.

use std::sync::Arc;

use crate::domain::ledger::apply_transfer;
use crate::domain::{Asset, NewTransfer, Tag, TransferRecord, UserId};
use crate::error::WalletError;
use crate::persistence::Persistence;

/// A transfer request as received, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest<'a> {
    /// Resolved sender.
    pub sender: UserId,
    /// Recipient tag, any case.
    pub to_tag: &'a str,
    /// Asset symbol.
    pub symbol: &'a str,
    /// Amount to move.
    pub amount: f64,
}

/// A request that passed validation. Holding one means no I/O has happened
/// yet and every field is well-formed.
#[derive(Debug, Clone, PartialEq)]
struct ValidTransfer {
    sender: UserId,
    to_tag: Tag,
    asset: Asset,
    amount: f64,
}

fn validate(request: &TransferRequest<'_>) -> Result<ValidTransfer, WalletError> {
    let to_tag = Tag::parse(request.to_tag).map_err(|_| WalletError::invalid("invalid recipient"))?;
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(WalletError::invalid("invalid amount"));
    }
    let asset = request
        .symbol
        .parse::<Asset>()
        .map_err(|_| WalletError::invalid("unsupported currency"))?;
    Ok(ValidTransfer {
        sender: request.sender,
        to_tag,
        asset,
        amount: request.amount,
    })
}

/// Executes transfers.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    store: Arc<dyn Persistence>,
}

impl TransferEngine {
    /// Creates the engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Moves `amount` of one asset from the sender to the tag's owner.
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |---|---|
    /// | malformed tag, or tag names the sender | 400 "invalid recipient" |
    /// | amount not finite or not positive | 400 "invalid amount" |
    /// | unknown symbol | 400 "unsupported currency" |
    /// | nobody holds the tag | 404 "recipient not found" |
    /// | sender has no balance row | 404 "balance not found" |
    /// | sender holds less than `amount` | 400 "insufficient balance" |
    /// | storage failure, including commit | 500 |
    pub async fn transfer(
        &self,
        request: &TransferRequest<'_>,
    ) -> Result<TransferRecord, WalletError> {
        let valid = validate(request)?;

        let recipient = self
            .store
            .find_user_id_by_tag(&valid.to_tag)
            .await?
            .ok_or(WalletError::NotFound("recipient not found"))?;
        if recipient == valid.sender {
            return Err(WalletError::invalid("invalid recipient"));
        }

        let mut tx = self.store.begin_transfer(valid.sender, recipient).await?;

        let sender_row = tx
            .latest_balance(valid.sender)
            .await?
            .ok_or(WalletError::NotFound("balance not found"))?;
        let recipient_balances = tx
            .latest_balance(recipient)
            .await?
            .map(|s| s.balances)
            .unwrap_or_default();

        let (sender_after, recipient_after) = apply_transfer(
            &sender_row.balances,
            &recipient_balances,
            valid.asset,
            valid.amount,
        )?;

        tx.insert_balance(valid.sender, &sender_after).await?;
        tx.insert_balance(recipient, &recipient_after).await?;
        let record = tx
            .insert_transfer(&NewTransfer {
                from: valid.sender,
                to: recipient,
                asset: valid.asset,
                amount: valid.amount,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            from = %valid.sender,
            to = %recipient,
            symbol = %valid.asset,
            amount = valid.amount,
            "transfer committed"
        );
        Ok(record)
    }
}
