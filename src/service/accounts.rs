//! User profiles, registration, login and credential changes.

use std::sync::Arc;

use crate::domain::{Balances, Tag, User, UserId};
use crate::error::WalletError;
use crate::persistence::Persistence;
use crate::service::session::{SessionAuth, SessionCookie};

/// Shortest accepted password, after trimming.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Production bcrypt work factor.
pub const DEFAULT_BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Bcrypt hashing, run on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    /// Creates a hasher with the given bcrypt cost (4..=31).
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hashes `password`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Hashing`] if bcrypt fails or the blocking task
    /// is lost.
    pub async fn hash(&self, password: &str) -> Result<String, WalletError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| WalletError::Hashing(e.to_string()))?
            .map_err(|e| WalletError::Hashing(e.to_string()))
    }

    /// Checks `password` against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Hashing`] if the stored hash is malformed or
    /// the blocking task is lost.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, WalletError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| WalletError::Hashing(e.to_string()))?
            .map_err(|e| WalletError::Hashing(e.to_string()))
    }
}

fn checked_password(raw: &str) -> Result<&str, WalletError> {
    let password = raw.trim();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WalletError::invalid("password too short"));
    }
    Ok(password)
}

fn checked_name(raw: &str) -> Result<&str, WalletError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(WalletError::invalid("name required"));
    }
    Ok(name)
}

/// Account operations over the user and session tables.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Arc<dyn Persistence>,
    sessions: SessionAuth,
    hasher: PasswordHasher,
    default_name: String,
}

impl AccountService {
    /// Creates the service. Lazily created users get `default_name`.
    #[must_use]
    pub fn new(
        store: Arc<dyn Persistence>,
        sessions: SessionAuth,
        hasher: PasswordHasher,
        default_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            hasher,
            default_name: default_name.into(),
        }
    }

    /// The session authenticator.
    #[must_use]
    pub const fn sessions(&self) -> &SessionAuth {
        &self.sessions
    }

    /// Creates a registered user with an all-zero balance row and signs
    /// them in.
    ///
    /// The initial balance row and the session are best-effort: a failure
    /// is logged and the registration still succeeds, in which case no
    /// cookie is returned.
    ///
    /// # Errors
    ///
    /// Returns 400 for an empty name, malformed tag or short password, 409
    /// if the tag is taken, or 500 on hashing or storage failure.
    pub async fn register(
        &self,
        name: &str,
        tag: &str,
        password: &str,
    ) -> Result<(User, Option<SessionCookie>), WalletError> {
        let name = checked_name(name)?;
        let tag = Tag::parse(tag)?;
        let password = checked_password(password)?;

        if self.store.tag_taken(&tag, None).await? {
            return Err(WalletError::TagTaken);
        }
        let hash = self.hasher.hash(password).await?;
        let id = self.store.create_user(name, &tag, &hash).await?;
        tracing::info!(user_id = %id, tag = %tag, "user registered");

        if let Err(e) = self.store.insert_balance(id, &Balances::default()).await {
            tracing::warn!(user_id = %id, error = %e, "failed to create initial balance");
        }
        let cookie = match self.sessions.issue(id).await {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "failed to issue session");
                None
            }
        };

        let user = User {
            id,
            name: name.to_string(),
            tag: Some(tag),
        };
        Ok((user, cookie))
    }

    /// Checks credentials and issues a session.
    ///
    /// # Errors
    ///
    /// Returns 400 "invalid credentials" for a malformed tag or empty
    /// password, 401 "invalid credentials" for an unknown tag or wrong
    /// password, or 500 on storage failure.
    pub async fn login(
        &self,
        tag: &str,
        password: &str,
    ) -> Result<(User, SessionCookie), WalletError> {
        let password = password.trim();
        let tag = Tag::parse(tag).map_err(|_| WalletError::invalid("invalid credentials"))?;
        if password.is_empty() {
            return Err(WalletError::invalid("invalid credentials"));
        }

        let Some((user, hash)) = self.store.find_credentials(&tag).await? else {
            return Err(WalletError::Unauthorized("invalid credentials"));
        };
        if !self.hasher.verify(password, &hash).await? {
            tracing::info!(tag = %tag, "login rejected");
            return Err(WalletError::Unauthorized("invalid credentials"));
        }

        let cookie = self.sessions.issue(user.id).await?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok((user, cookie))
    }

    /// The profile behind a session token.
    ///
    /// # Errors
    ///
    /// Returns 401 "not authenticated" when the token is missing, unknown,
    /// expired or names a vanished user; 500 on storage failure.
    pub async fn me(&self, session_token: Option<&str>) -> Result<User, WalletError> {
        let id = self
            .sessions
            .validate(session_token)
            .await
            .ok_or(WalletError::Unauthorized("not authenticated"))?;
        self.store
            .find_user(id)
            .await?
            .ok_or(WalletError::Unauthorized("not authenticated"))
    }

    /// Loads a profile, creating it with the default name on first access.
    ///
    /// # Errors
    ///
    /// Returns a persistence error.
    pub async fn get_or_create(&self, id: UserId) -> Result<User, WalletError> {
        if let Some(user) = self.store.find_user(id).await? {
            return Ok(user);
        }
        self.store.upsert_name(id, &self.default_name).await?;
        tracing::info!(user_id = %id, "user created on first access");
        Ok(User {
            id,
            name: self.default_name.clone(),
            tag: None,
        })
    }

    /// Sets the display name, creating the user if needed. Returns the
    /// stored (trimmed) name.
    ///
    /// # Errors
    ///
    /// Returns 400 "name required" for a blank name, or a persistence error.
    pub async fn set_name(&self, id: UserId, name: &str) -> Result<String, WalletError> {
        let name = checked_name(name)?;
        self.store.upsert_name(id, name).await?;
        Ok(name.to_string())
    }

    /// Replaces the user's tag.
    ///
    /// # Errors
    ///
    /// Returns 400 "invalid tag", 409 if another user holds it, or a
    /// persistence error.
    pub async fn set_tag(&self, id: UserId, tag: &str) -> Result<Tag, WalletError> {
        let tag = Tag::parse(tag)?;
        if self.store.tag_taken(&tag, Some(id)).await? {
            return Err(WalletError::TagTaken);
        }
        self.store.set_tag(id, &tag).await?;
        tracing::info!(user_id = %id, tag = %tag, "tag updated");
        Ok(tag)
    }

    /// Replaces the user's password.
    ///
    /// # Errors
    ///
    /// Returns 400 "password too short", or 500 on hashing or storage
    /// failure.
    pub async fn set_password(&self, id: UserId, password: &str) -> Result<(), WalletError> {
        let password = checked_password(password)?;
        let hash = self.hasher.hash(password).await?;
        self.store.set_password_hash(id, &hash).await?;
        tracing::info!(user_id = %id, "password updated");
        Ok(())
    }
}
