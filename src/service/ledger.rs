//! Balance reads and writes over the append-only ledger.

use std::sync::Arc;

use crate::domain::ledger::is_well_formed;
use crate::domain::{BalanceSnapshot, Balances, TransferRecord, UserId};
use crate::error::WalletError;
use crate::persistence::Persistence;

/// Default page size for transfer history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
/// Largest page size for transfer history.
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Per-user balance ledger.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    store: Arc<dyn Persistence>,
}

impl LedgerStore {
    /// Creates the ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// The user's latest balance row.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::NotFound`] if the user has no balance row, or
    /// a persistence error.
    pub async fn get(&self, user: UserId) -> Result<BalanceSnapshot, WalletError> {
        self.store
            .latest_balance(user)
            .await?
            .ok_or(WalletError::NotFound("balance not found"))
    }

    /// The user's latest balances, all zero if they have none yet.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn get_or_zero(&self, user: UserId) -> Result<Balances, WalletError> {
        Ok(self
            .store
            .latest_balance(user)
            .await?
            .map(|s| s.balances)
            .unwrap_or_default())
    }

    /// Appends a new balance row. Assets absent from the request are zero;
    /// nothing is carried forward from the previous row.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidRequest`] for negative or non-finite
    /// amounts, or a persistence error.
    pub async fn put(
        &self,
        user: UserId,
        balances: &Balances,
    ) -> Result<BalanceSnapshot, WalletError> {
        if !is_well_formed(balances) {
            return Err(WalletError::invalid("invalid balances"));
        }
        let snapshot = self.store.insert_balance(user, balances).await?;
        tracing::debug!(user_id = %user, "balances saved");
        Ok(snapshot)
    }

    /// Transfers the user sent or received, newest first. `limit` is
    /// clamped to `1..=MAX_HISTORY_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn history(
        &self,
        user: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<TransferRecord>, WalletError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.store.transfer_history(user, limit).await?)
    }
}
