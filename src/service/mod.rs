//! Service layer: business logic orchestration.
//!
//! [`RateStore`] and [`RateFetcher`] run the rate pipeline and work with or
//! without a relational store. Everything in [`WalletServices`] needs one.

pub mod accounts;
pub mod identity;
pub mod ledger;
pub mod rate_fetcher;
pub mod rate_store;
pub mod session;
pub mod transfer;

use std::sync::Arc;

pub use accounts::{AccountService, PasswordHasher};
pub use identity::{IdentityMode, resolve_identity};
pub use ledger::LedgerStore;
pub use rate_fetcher::{CoinGeckoOracle, PriceOracle, RateFetcher};
pub use rate_store::{RateSource, RateStore, RatesView};
pub use session::{SessionAuth, SessionCookie};
pub use transfer::{TransferEngine, TransferRequest};

use crate::persistence::Persistence;

/// The services backed by the relational store.
#[derive(Debug, Clone)]
pub struct WalletServices {
    /// Profiles, registration and login.
    pub accounts: AccountService,
    /// Balance rows and history.
    pub ledger: LedgerStore,
    /// Transfers.
    pub transfers: TransferEngine,
}

impl WalletServices {
    /// Wires every service to the same store.
    #[must_use]
    pub fn new(
        store: Arc<dyn Persistence>,
        hasher: PasswordHasher,
        default_name: impl Into<String>,
    ) -> Self {
        let sessions = SessionAuth::new(Arc::clone(&store));
        Self {
            accounts: AccountService::new(Arc::clone(&store), sessions, hasher, default_name),
            ledger: LedgerStore::new(Arc::clone(&store)),
            transfers: TransferEngine::new(store),
        }
    }

    /// The session authenticator.
    #[must_use]
    pub const fn sessions(&self) -> &SessionAuth {
        self.accounts.sessions()
    }
}
