//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::PersistenceMode;
use crate::error::WalletError;
use crate::service::{RateStore, WalletServices};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Rate pipeline read side.
    pub rates: Arc<RateStore>,
    /// Account and ledger services; `None` when persistence is disabled.
    pub wallet: Option<Arc<WalletServices>>,
    /// Backend actually in use, after any start-up degradation.
    pub persistence: PersistenceMode,
}

impl AppState {
    /// The wallet services.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::PersistenceDisabled`] when running without a
    /// relational store.
    pub fn wallet(&self) -> Result<&WalletServices, WalletError> {
        self.wallet
            .as_deref()
            .ok_or(WalletError::PersistenceDisabled)
    }
}
