//! Balance handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{BalancesResponse, IdentityQuery, SaveBalancesRequest, SaveBalancesResponse};
use crate::api::handlers::identify;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, WalletError};
use crate::service::IdentityMode;

/// `GET /balances` — Latest balances; all zero for a user without any.
///
/// # Errors
///
/// Returns [`WalletError`] on storage failure or when persistence is
/// disabled.
#[utoipa::path(
    get,
    path = "/balances",
    tag = "Balances",
    summary = "Get balances",
    params(IdentityQuery),
    responses(
        (status = 200, description = "Balances", body = BalancesResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn get_balances(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<BalancesResponse>, WalletError> {
    let wallet = state.wallet()?;
    let id = identify(wallet, &headers, query.explicit(), IdentityMode::ReadOnly).await?;
    let balances = wallet.ledger.get_or_zero(id).await?;
    Ok(Json(BalancesResponse {
        user_id: id.get(),
        balances,
    }))
}

/// `POST /balances` — Append a balance row. Omitted symbols become zero.
///
/// # Errors
///
/// Returns [`WalletError`] for negative or non-finite amounts, an
/// unresolvable user, storage failure or disabled persistence.
#[utoipa::path(
    post,
    path = "/balances",
    tag = "Balances",
    summary = "Save balances",
    request_body = SaveBalancesRequest,
    responses(
        (status = 200, description = "Saved", body = SaveBalancesResponse),
        (status = 400, description = "Bad body, amounts or user", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn save_balances(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SaveBalancesRequest>, JsonRejection>,
) -> Result<Json<SaveBalancesResponse>, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let id = identify(wallet, &headers, req.user_id, IdentityMode::Required).await?;
    wallet.ledger.put(id, &req.balances).await?;
    Ok(Json(SaveBalancesResponse {
        user_id: id.get(),
        saved: true,
    }))
}

/// Balance routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/balances", get(get_balances).post(save_balances))
}
