//! Transfer handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    HistoryQuery, SavedResponse, TransferBody, TransferDto, TransferHistoryResponse,
};
use crate::api::handlers::identify;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, WalletError};
use crate::service::{IdentityMode, TransferRequest};

/// `POST /transfer` — Send an amount of one asset to a tag.
///
/// # Errors
///
/// Returns [`WalletError`] for invalid fields, an unknown recipient, a
/// missing or insufficient sender balance, storage failure or disabled
/// persistence.
#[utoipa::path(
    post,
    path = "/transfer",
    tag = "Transfers",
    summary = "Transfer",
    description = "Atomically debits the sender, credits the owner of `to_tag` and records the transfer.",
    request_body = TransferBody,
    responses(
        (status = 200, description = "Committed", body = SavedResponse),
        (status = 400, description = "Invalid recipient, amount or currency, or insufficient balance", body = ErrorResponse),
        (status = 404, description = "Recipient or sender balance not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransferBody>, JsonRejection>,
) -> Result<Json<SavedResponse>, WalletError> {
    let wallet = state.wallet()?;
    let Json(body) = payload?;
    let sender = identify(wallet, &headers, body.from_user_id, IdentityMode::Required).await?;
    wallet
        .transfers
        .transfer(&TransferRequest {
            sender,
            to_tag: &body.to_tag,
            symbol: &body.symbol,
            amount: body.amount,
        })
        .await?;
    Ok(Json(SavedResponse::ok()))
}

/// `GET /transfers` — Transfers sent or received, newest first.
///
/// # Errors
///
/// Returns [`WalletError`] on storage failure or when persistence is
/// disabled.
#[utoipa::path(
    get,
    path = "/transfers",
    tag = "Transfers",
    summary = "Transfer history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History", body = TransferHistoryResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransferHistoryResponse>, WalletError> {
    let wallet = state.wallet()?;
    let explicit = query.identity().explicit();
    let id = identify(wallet, &headers, explicit, IdentityMode::ReadOnly).await?;
    let transfers = wallet.ledger.history(id, query.limit()).await?;
    Ok(Json(TransferHistoryResponse {
        user_id: id.get(),
        transfers: transfers.into_iter().map(TransferDto::from).collect(),
    }))
}

/// Transfer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transfer", post(create_transfer))
        .route("/transfers", get(list_transfers))
}
