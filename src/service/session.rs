//! Opaque session tokens backed by the session table.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use crate::domain::{Session, UserId};
use crate::error::WalletError;
use crate::persistence::Persistence;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "bw_session";

/// Session lifetime in days. Expiry is fixed; sessions are not extended on use.
pub const SESSION_TTL_DAYS: i64 = 30;

const TOKEN_BYTES: usize = 32;

/// A freshly issued session, ready to be sent as `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Hex-encoded token.
    pub token: String,
    /// Cookie lifetime in seconds.
    pub max_age_secs: i64,
}

impl SessionCookie {
    /// The `Set-Cookie` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!(
            "{SESSION_COOKIE}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.token, self.max_age_secs
        )
    }
}

/// Extracts the session token from a `Cookie` request header.
#[must_use]
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
    })
}

/// Issues and validates sessions.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    store: Arc<dyn Persistence>,
    rng: SystemRandom,
    ttl: Duration,
}

impl SessionAuth {
    /// Creates the authenticator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self {
            store,
            rng: SystemRandom::new(),
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Creates a session for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Internal`] if the system RNG fails, or a
    /// persistence error if the session row cannot be stored.
    pub async fn issue(&self, user: UserId) -> Result<SessionCookie, WalletError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| WalletError::Internal("system rng unavailable".to_string()))?;
        let token = hex::encode(bytes);

        let now = Utc::now();
        let session = Session {
            token: token.clone(),
            user_id: user,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.insert_session(&session).await?;
        tracing::debug!(user_id = %user, "session issued");

        Ok(SessionCookie {
            token,
            max_age_secs: self.ttl.num_seconds(),
        })
    }

    /// The user behind `token`, if it names an unexpired session.
    ///
    /// Lookup failures are logged and treated as "not authenticated".
    pub async fn validate(&self, token: Option<&str>) -> Option<UserId> {
        let token = token.filter(|t| !t.is_empty())?;
        match self.store.find_session(token).await {
            Ok(Some(session)) if session.is_valid_at(Utc::now()) => Some(session.user_id),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::SessionRepository;
    use crate::persistence::memory::MemoryPersistence;

    fn uid(raw: i64) -> UserId {
        let Some(id) = UserId::new(raw) else {
            panic!("positive id");
        };
        id
    }

    #[tokio::test]
    async fn issued_token_validates() {
        let store = MemoryPersistence::new();
        let auth = SessionAuth::new(Arc::new(store.clone()));
        let Ok(cookie) = auth.issue(uid(4)).await else {
            panic!("issue failed");
        };
        assert_eq!(cookie.token.len(), 64);
        assert!(cookie.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(cookie.max_age_secs, 2_592_000);
        assert_eq!(auth.validate(Some(&cookie.token)).await, Some(uid(4)));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let auth = SessionAuth::new(Arc::new(MemoryPersistence::new()));
        let (Ok(a), Ok(b)) = (auth.issue(uid(1)).await, auth.issue(uid(1)).await) else {
            panic!("issue failed");
        };
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn expired_or_unknown_token_is_rejected() {
        let store = MemoryPersistence::new();
        let now = Utc::now();
        let _ = store
            .insert_session(&Session {
                token: "stale".to_string(),
                user_id: uid(2),
                created_at: now - Duration::days(31),
                expires_at: now - Duration::days(1),
            })
            .await;
        let auth = SessionAuth::new(Arc::new(store));

        assert_eq!(auth.validate(Some("stale")).await, None);
        assert_eq!(auth.validate(Some("never-issued")).await, None);
        assert_eq!(auth.validate(Some("")).await, None);
        assert_eq!(auth.validate(None).await, None);
    }

    #[tokio::test]
    async fn store_outage_means_unauthenticated() {
        let store = MemoryPersistence::new();
        let auth = SessionAuth::new(Arc::new(store.clone()));
        let Ok(cookie) = auth.issue(uid(3)).await else {
            panic!("issue failed");
        };
        store.set_available(false);
        assert_eq!(auth.validate(Some(&cookie.token)).await, None);
    }

    #[test]
    fn cookie_header_attributes() {
        let cookie = SessionCookie {
            token: "abc".to_string(),
            max_age_secs: 2_592_000,
        };
        assert_eq!(
            cookie.header_value(),
            "bw_session=abc; Path=/; Max-Age=2592000; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        assert_eq!(
            token_from_cookie_header("theme=dark; bw_session=deadbeef; lang=en"),
            Some("deadbeef")
        );
        assert_eq!(token_from_cookie_header("bw_session="), None);
        assert_eq!(token_from_cookie_header("other=1"), None);
    }
}
