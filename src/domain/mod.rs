//! Domain layer: assets, tags, users, rate and ledger snapshots.
//!
//! Everything here is pure data and arithmetic; storage and HTTP live in
//! `persistence/` and `api/`.

pub mod asset;
pub mod ledger;
pub mod rates;
pub mod tag;
pub mod user;

pub use asset::{Asset, AssetMap, UnknownAsset};
pub use ledger::{BalanceSnapshot, Balances, InsufficientBalance, NewTransfer, TransferRecord};
pub use rates::{Prices, RateSnapshot, compute_roi};
pub use tag::{InvalidTag, Tag};
pub use user::{Session, User, UserId};
