//! Rate snapshots and the ROI derivation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{Asset, AssetMap};

/// USD prices for every supported asset.
pub type Prices = AssetMap<f64>;

/// One complete, immutable price snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Price per asset.
    pub prices: Prices,
}

/// Percentage change per asset between a baseline and the current prices.
///
/// Assets whose baseline is zero, or whose result is not finite, are left
/// out of the mapping.
#[must_use]
pub fn compute_roi(current: &Prices, daily: &Prices) -> BTreeMap<Asset, f64> {
    current
        .iter()
        .filter_map(|(asset, &now)| {
            let base = *daily.get(asset);
            if base == 0.0 {
                return None;
            }
            let roi = (now - base) / base * 100.0;
            roi.is_finite().then_some((asset, roi))
        })
        .collect()
}
