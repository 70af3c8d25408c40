//! Rates endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::RatesResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, WalletError};

/// `GET /rates` — Current prices, daily baseline and ROI.
///
/// # Errors
///
/// Returns [`WalletError::RatesUnavailable`] when no snapshot exists in
/// either tier.
#[utoipa::path(
    get,
    path = "/rates",
    tag = "Rates",
    summary = "Current rates",
    description = "Latest USD price per asset, the snapshot from about a day earlier, and the percent change between them. Served from the rate file, with an empty ROI, when the database has nothing.",
    responses(
        (status = 200, description = "Rates", body = RatesResponse),
        (status = 503, description = "No snapshot available", body = ErrorResponse),
    )
)]
pub async fn get_rates(State(state): State<AppState>) -> Result<Json<RatesResponse>, WalletError> {
    let view = state.rates.current().await?;
    Ok(Json(view.into()))
}

/// Rates routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/rates", get(get_rates))
}
