//! Rates endpoint DTOs.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Asset, Prices};
use crate::service::RatesView;

/// Response body for `GET /rates`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatesResponse {
    /// Latest USD price per symbol.
    #[schema(value_type = Object)]
    pub current: Prices,
    /// Baseline prices, about a day old.
    #[schema(value_type = Object)]
    pub daily: Prices,
    /// Percent change per symbol. Symbols without a usable baseline are
    /// omitted; empty when served from the rate file.
    #[schema(value_type = Object)]
    pub roi: BTreeMap<Asset, f64>,
}

impl From<RatesView> for RatesResponse {
    fn from(view: RatesView) -> Self {
        Self {
            current: view.current,
            daily: view.daily,
            roi: view.roi,
        }
    }
}
