//! Persistence layer: repository traits and their backends.
//!
//! The relational store is reached through the repository traits below.
//! [`postgres::PostgresPersistence`] is the production backend,
//! [`memory::MemoryPersistence`] keeps everything in process for local runs
//! and tests. The rate file tier is separate ([`rate_file::RateFile`]) and
//! never shares a transaction with the relational store.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod rate_file;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BalanceSnapshot, Balances, NewTransfer, RateSnapshot, Session, Tag, TransferRecord, User,
    UserId,
};

/// Failure reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The database driver reported an error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migrations could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Another user already holds the tag.
    #[error("tag already taken")]
    TagTaken,

    /// A stored value could not be mapped back to a domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// The backend is not reachable.
    #[error("store unavailable")]
    Unavailable,
}

impl PersistenceError {
    /// Whether the failure means the backend could not be reached at all,
    /// as opposed to rejecting or failing a particular statement.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::Database(
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
        )
    }
}

/// Rate snapshot storage.
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Appends a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert_rates(&self, snapshot: &RateSnapshot) -> Result<(), PersistenceError>;

    /// The most recent snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn latest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError>;

    /// The most recent snapshot taken at or before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn rates_at_or_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<RateSnapshot>, PersistenceError>;

    /// The oldest snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn oldest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError>;
}

/// User profiles and credentials.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Loads a profile by id.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, PersistenceError>;

    /// Loads a profile and its password hash by tag.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn find_credentials(&self, tag: &Tag)
    -> Result<Option<(User, String)>, PersistenceError>;

    /// Resolves a tag to its owner.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn find_user_id_by_tag(&self, tag: &Tag) -> Result<Option<UserId>, PersistenceError>;

    /// Whether `tag` is held by any user other than `except`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn tag_taken(&self, tag: &Tag, except: Option<UserId>)
    -> Result<bool, PersistenceError>;

    /// Creates a registered user and returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::TagTaken`] if the tag was claimed
    /// concurrently, or another [`PersistenceError`] on storage failure.
    async fn create_user(
        &self,
        name: &str,
        tag: &Tag,
        password_hash: &str,
    ) -> Result<UserId, PersistenceError>;

    /// Creates the user with the given id or renames it if it exists.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn upsert_name(&self, id: UserId, name: &str) -> Result<(), PersistenceError>;

    /// Replaces a user's tag.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::TagTaken`] if the tag was claimed
    /// concurrently, or another [`PersistenceError`] on storage failure.
    async fn set_tag(&self, id: UserId, tag: &Tag) -> Result<(), PersistenceError>;

    /// Replaces a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), PersistenceError>;
}

/// Session rows.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert_session(&self, session: &Session) -> Result<(), PersistenceError>;

    /// Looks a session up by token, regardless of expiry.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn find_session(&self, token: &str) -> Result<Option<Session>, PersistenceError>;
}

/// Append-only balance ledger and transfer audit log.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// The latest balance row for `user`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn latest_balance(&self, user: UserId)
    -> Result<Option<BalanceSnapshot>, PersistenceError>;

    /// Appends a balance row stamped now.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert_balance(
        &self,
        user: UserId,
        balances: &Balances,
    ) -> Result<BalanceSnapshot, PersistenceError>;

    /// Transfers sent or received by `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn transfer_history(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, PersistenceError>;

    /// Opens a transactional scope for a transfer between two users.
    ///
    /// The scope holds exclusive access to both users' ledgers until it is
    /// committed or dropped, so two transfers touching the same user are
    /// serialized.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the scope cannot be opened.
    async fn begin_transfer(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Box<dyn LedgerTransaction>, PersistenceError>;
}

/// Writes made through a [`LedgerTransaction`] become visible together on
/// [`LedgerTransaction::commit`]. Dropping the transaction discards them.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// The latest balance row for `user` as seen inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn latest_balance(
        &mut self,
        user: UserId,
    ) -> Result<Option<BalanceSnapshot>, PersistenceError>;

    /// Appends a balance row.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert_balance(
        &mut self,
        user: UserId,
        balances: &Balances,
    ) -> Result<(), PersistenceError>;

    /// Appends the audit record.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] on storage failure.
    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, PersistenceError>;

    /// Makes every write visible atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the commit fails; nothing is
    /// written in that case.
    async fn commit(self: Box<Self>) -> Result<(), PersistenceError>;
}

/// Everything the account and rate services need from the relational store.
pub trait Persistence:
    RateRepository + UserRepository + SessionRepository + LedgerRepository + Debug
{
}

impl<T> Persistence for T where
    T: RateRepository + UserRepository + SessionRepository + LedgerRepository + Debug
{
}
