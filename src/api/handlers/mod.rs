//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod balances;
pub mod rates;
pub mod system;
pub mod transfer;
pub mod user;

use axum::Router;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::WalletError;
use crate::service::session::token_from_cookie_header;
use crate::service::{IdentityMode, SessionCookie, WalletServices, identity};

/// Composes all resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(rates::routes())
        .merge(user::routes())
        .merge(auth::routes())
        .merge(balances::routes())
        .merge(transfer::routes())
}

/// The `bw_session` token from the request's `Cookie` headers.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
}

/// Resolves the caller from an explicit id and the session cookie.
pub(crate) async fn identify(
    wallet: &WalletServices,
    headers: &HeaderMap,
    explicit: Option<i64>,
    mode: IdentityMode,
) -> Result<UserId, WalletError> {
    identity::resolve(wallet.sessions(), explicit, session_token(headers), mode).await
}

/// Adds `Set-Cookie` for a freshly issued session.
pub(crate) fn with_session_cookie(
    mut response: Response,
    cookie: &SessionCookie,
) -> Result<Response, WalletError> {
    let value = HeaderValue::from_str(&cookie.header_value())
        .map_err(|e| WalletError::Internal(e.to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_is_read_from_any_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("bw_session=cafe01"));
        assert_eq!(session_token(&headers), Some("cafe01"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
