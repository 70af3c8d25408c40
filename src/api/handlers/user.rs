//! Profile handlers: read, rename, change tag, change password.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    IdentityQuery, SavedResponse, SetPasswordRequest, SetTagRequest, TagResponse,
    UpdateNameRequest, UpdateNameResponse, UserResponse,
};
use crate::api::handlers::identify;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, WalletError};
use crate::service::IdentityMode;

/// `GET /user` — Caller's profile, created with the default name on first
/// access.
///
/// # Errors
///
/// Returns [`WalletError`] on storage failure or when persistence is
/// disabled.
#[utoipa::path(
    get,
    path = "/user",
    tag = "Users",
    summary = "Get profile",
    description = "Resolves the user from `id`/`user_id`, then the session cookie, then the anonymous user 1. Unknown users are created with the default display name.",
    params(IdentityQuery),
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IdentityQuery>,
) -> Result<Json<UserResponse>, WalletError> {
    let wallet = state.wallet()?;
    let id = identify(wallet, &headers, query.explicit(), IdentityMode::ReadOnly).await?;
    let user = wallet.accounts.get_or_create(id).await?;
    Ok(Json(user.into()))
}

/// `POST /user` — Set the display name.
///
/// # Errors
///
/// Returns [`WalletError`] for a blank name, unresolvable user, storage
/// failure or disabled persistence.
#[utoipa::path(
    post,
    path = "/user",
    tag = "Users",
    summary = "Set display name",
    request_body = UpdateNameRequest,
    responses(
        (status = 200, description = "Name stored", body = UpdateNameResponse),
        (status = 400, description = "Bad body, blank name or no user", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn update_name(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateNameRequest>, JsonRejection>,
) -> Result<Json<UpdateNameResponse>, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let id = identify(wallet, &headers, req.user_id, IdentityMode::Required).await?;
    let name = wallet.accounts.set_name(id, &req.name).await?;
    Ok(Json(UpdateNameResponse {
        user_id: id.get(),
        name,
    }))
}

/// `POST /user/tag` — Claim or change the caller's tag.
///
/// # Errors
///
/// Returns [`WalletError`] for a malformed or taken tag, unresolvable user,
/// storage failure or disabled persistence.
#[utoipa::path(
    post,
    path = "/user/tag",
    tag = "Users",
    summary = "Set tag",
    description = "Tags are trimmed and lower-cased, then must be 3 to 12 characters of `a-z`, `0-9`, `_`, `.` or `-`.",
    request_body = SetTagRequest,
    responses(
        (status = 200, description = "Tag stored", body = TagResponse),
        (status = 400, description = "Invalid tag", body = ErrorResponse),
        (status = 409, description = "Tag taken", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn set_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SetTagRequest>, JsonRejection>,
) -> Result<Json<TagResponse>, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let id = identify(wallet, &headers, req.user_id, IdentityMode::Required).await?;
    let tag = wallet.accounts.set_tag(id, &req.tag).await?;
    Ok(Json(TagResponse {
        tag: tag.as_str().to_string(),
    }))
}

/// `POST /user/password` — Set the caller's password.
///
/// # Errors
///
/// Returns [`WalletError`] for a short password, unresolvable user,
/// hashing or storage failure, or disabled persistence.
#[utoipa::path(
    post,
    path = "/user/password",
    tag = "Users",
    summary = "Set password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password stored", body = SavedResponse),
        (status = 400, description = "Password too short or no user", body = ErrorResponse),
        (status = 500, description = "Hashing or storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn set_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<Json<SavedResponse>, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let id = identify(wallet, &headers, req.user_id, IdentityMode::Required).await?;
    wallet.accounts.set_password(id, &req.password).await?;
    Ok(Json(SavedResponse::ok()))
}

/// Profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(get_user).post(update_name))
        .route("/user/tag", post(set_tag))
        .route("/user/password", post(set_password))
}
