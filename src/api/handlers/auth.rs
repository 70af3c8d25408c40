//! Registration, login and session introspection.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{LoginRequest, RegisterRequest, UserResponse};
use crate::api::handlers::{session_token, with_session_cookie};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, WalletError};

/// `POST /auth/register` — Create an account and sign in.
///
/// # Errors
///
/// Returns [`WalletError`] for invalid fields, a taken tag, hashing or
/// storage failure, or disabled persistence.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Creates a user with an all-zero balance and sets the `bw_session` cookie.",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = UserResponse,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid name, tag or password", body = ErrorResponse),
        (status = 409, description = "Tag taken", body = ErrorResponse),
        (status = 500, description = "Hashing or storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let (user, cookie) = wallet
        .accounts
        .register(&req.name, &req.tag, &req.password)
        .await?;
    let response = Json(UserResponse::from(user)).into_response();
    match cookie {
        Some(cookie) => with_session_cookie(response, &cookie),
        None => Ok(response),
    }
}

/// `POST /auth/login` — Exchange tag and password for a session.
///
/// # Errors
///
/// Returns [`WalletError`] for malformed or wrong credentials, storage
/// failure or disabled persistence.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = UserResponse,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Malformed credentials", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, WalletError> {
    let wallet = state.wallet()?;
    let Json(req) = payload?;
    let (user, cookie) = wallet.accounts.login(&req.tag, &req.password).await?;
    with_session_cookie(Json(UserResponse::from(user)).into_response(), &cookie)
}

/// `GET /auth/me` — Profile of the session user.
///
/// # Errors
///
/// Returns [`WalletError`] without a valid session, on storage failure, or
/// when persistence is disabled.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    summary = "Current user",
    responses(
        (status = 200, description = "Session user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
        (status = 503, description = "Persistence disabled or unreachable", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, WalletError> {
    let wallet = state.wallet()?;
    let user = wallet.accounts.me(session_token(&headers)).await?;
    Ok(Json(user.into()))
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}
