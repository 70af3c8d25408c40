//! User identity, profile and session types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Tag;

/// Server-assigned user identifier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Identity used by read-only endpoints when nothing else resolves.
    pub const ANONYMOUS: Self = Self(1);

    /// Wraps `raw` if it is a positive id.
    #[must_use]
    pub const fn new(raw: i64) -> Option<Self> {
        if raw > 0 { Some(Self(raw)) } else { None }
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Transfer handle, if one has been chosen.
    pub tag: Option<Tag>,
}

/// A session row binding an opaque token to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Hex-encoded random token.
    pub token: String,
    /// Owner of the session.
    pub user_id: UserId,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Fixed expiry; sessions are not extended on use.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid strictly before its expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn non_positive_ids_rejected() {
        assert_eq!(UserId::new(0), None);
        assert_eq!(UserId::new(-4), None);
        assert_eq!(UserId::new(7).map(UserId::get), Some(7));
    }

    #[test]
    fn session_expires_at_boundary() {
        let now = Utc::now();
        let session = Session {
            token: "t".to_string(),
            user_id: UserId::ANONYMOUS,
            created_at: now - Duration::days(30),
            expires_at: now,
        };
        assert!(!session.is_valid_at(now));
        assert!(session.is_valid_at(now - Duration::seconds(1)));
    }
}
