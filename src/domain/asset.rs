//! The fixed, enumerated asset set and the per-asset record type.
//!
//! Every price or balance map in the service is an [`AssetMap`]: one field
//! per supported [`Asset`], so an unsupported symbol can only ever appear at
//! the parsing boundary, never inside the ledger.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported asset symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    /// Tether, pegged locally at 1.0.
    Usdt,
    /// Bitcoin.
    Btc,
    /// Ether.
    Eth,
    /// Solana.
    Sol,
    /// Tron.
    Trx,
    /// Toncoin.
    Ton,
    /// Local reward token, priced locally.
    Blink,
}

impl Asset {
    /// All supported assets in display order.
    pub const ALL: [Self; 7] = [
        Self::Usdt,
        Self::Btc,
        Self::Eth,
        Self::Sol,
        Self::Trx,
        Self::Ton,
        Self::Blink,
    ];

    /// Upper-case ticker symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usdt => "USDT",
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Sol => "SOL",
            Self::Trx => "TRX",
            Self::Ton => "TON",
            Self::Blink => "BLINK",
        }
    }

    /// Locally fixed USD price, if this asset is not fetched externally.
    #[must_use]
    pub const fn fixed_price(self) -> Option<f64> {
        match self {
            Self::Usdt => Some(1.0),
            Self::Blink => Some(100.0),
            _ => None,
        }
    }

    /// Identifier of this asset at the external price oracle.
    ///
    /// `None` for fixed assets, which are never requested.
    #[must_use]
    pub const fn oracle_id(self) -> Option<&'static str> {
        match self {
            Self::Btc => Some("bitcoin"),
            Self::Eth => Some("ethereum"),
            Self::Sol => Some("solana"),
            Self::Trx => Some("tron"),
            Self::Ton => Some("the-open-network"),
            Self::Usdt | Self::Blink => None,
        }
    }

    /// Assets whose price comes from the external oracle.
    pub fn tracked() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|a| a.oracle_id().is_some())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Returned when a symbol is not one of the supported assets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported asset: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for Asset {
    type Err = UnknownAsset;

    /// Symbols are matched exactly; `"usdt"` is not accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.symbol() == s)
            .ok_or_else(|| UnknownAsset(s.to_string()))
    }
}

/// One value per supported asset.
///
/// Serializes as a JSON object keyed by symbol (`{"USDT": 1.0, ...}`).
/// Missing keys deserialize to `T::default()` and unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct AssetMap<T> {
    /// USDT entry.
    pub usdt: T,
    /// BTC entry.
    pub btc: T,
    /// ETH entry.
    pub eth: T,
    /// SOL entry.
    pub sol: T,
    /// TRX entry.
    pub trx: T,
    /// TON entry.
    pub ton: T,
    /// BLINK entry.
    pub blink: T,
}

impl<T> AssetMap<T> {
    /// Builds a map by evaluating `f` for every asset.
    pub fn from_fn(mut f: impl FnMut(Asset) -> T) -> Self {
        Self {
            usdt: f(Asset::Usdt),
            btc: f(Asset::Btc),
            eth: f(Asset::Eth),
            sol: f(Asset::Sol),
            trx: f(Asset::Trx),
            ton: f(Asset::Ton),
            blink: f(Asset::Blink),
        }
    }

    /// Same as [`AssetMap::from_fn`] but stops at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_from_fn<E>(mut f: impl FnMut(Asset) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            usdt: f(Asset::Usdt)?,
            btc: f(Asset::Btc)?,
            eth: f(Asset::Eth)?,
            sol: f(Asset::Sol)?,
            trx: f(Asset::Trx)?,
            ton: f(Asset::Ton)?,
            blink: f(Asset::Blink)?,
        })
    }

    /// Returns the entry for `asset`.
    #[must_use]
    pub const fn get(&self, asset: Asset) -> &T {
        match asset {
            Asset::Usdt => &self.usdt,
            Asset::Btc => &self.btc,
            Asset::Eth => &self.eth,
            Asset::Sol => &self.sol,
            Asset::Trx => &self.trx,
            Asset::Ton => &self.ton,
            Asset::Blink => &self.blink,
        }
    }

    /// Returns a mutable reference to the entry for `asset`.
    pub fn get_mut(&mut self, asset: Asset) -> &mut T {
        match asset {
            Asset::Usdt => &mut self.usdt,
            Asset::Btc => &mut self.btc,
            Asset::Eth => &mut self.eth,
            Asset::Sol => &mut self.sol,
            Asset::Trx => &mut self.trx,
            Asset::Ton => &mut self.ton,
            Asset::Blink => &mut self.blink,
        }
    }

    /// Iterates `(asset, value)` pairs in [`Asset::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Asset, &T)> {
        Asset::ALL.into_iter().map(move |a| (a, self.get(a)))
    }
}
