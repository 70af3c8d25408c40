//! Request identity resolution.
//!
//! Precedence: an explicit positive id from the request, then the user
//! behind a valid session cookie, then the anonymous user (read-only
//! endpoints only).

use crate::domain::UserId;
use crate::error::WalletError;
use crate::service::session::SessionAuth;

/// How an endpoint treats a request that carries no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Falls back to [`UserId::ANONYMOUS`].
    ReadOnly,
    /// Rejects the request.
    Required,
}

/// Pure precedence rule. Returns `None` only in [`IdentityMode::Required`]
/// when neither an explicit id nor a session is present.
#[must_use]
pub fn resolve_identity(
    explicit: Option<i64>,
    session: Option<UserId>,
    mode: IdentityMode,
) -> Option<UserId> {
    explicit
        .and_then(UserId::new)
        .or(session)
        .or(match mode {
            IdentityMode::ReadOnly => Some(UserId::ANONYMOUS),
            IdentityMode::Required => None,
        })
}

/// Resolves the caller, consulting the session store only when no explicit
/// id was supplied.
///
/// # Errors
///
/// Returns [`WalletError::InvalidRequest`] ("invalid user") in
/// [`IdentityMode::Required`] when no identity can be established.
pub async fn resolve(
    sessions: &SessionAuth,
    explicit: Option<i64>,
    session_token: Option<&str>,
    mode: IdentityMode,
) -> Result<UserId, WalletError> {
    let session = if explicit.and_then(UserId::new).is_some() {
        None
    } else {
        sessions.validate(session_token).await
    };
    resolve_identity(explicit, session, mode).ok_or_else(|| WalletError::invalid("invalid user"))
}
