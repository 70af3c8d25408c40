//! In-process implementation of the repository traits.
//!
//! Used for local runs (`PERSISTENCE_MODE=memory`) and throughout the test
//! suite. All state sits behind one async mutex; a transfer scope holds that
//! mutex until it is committed or dropped, which serializes transfers the
//! same way the PostgreSQL backend's advisory locks do.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    LedgerRepository, LedgerTransaction, PersistenceError, RateRepository, SessionRepository,
    UserRepository,
};
use crate::domain::{
    BalanceSnapshot, Balances, NewTransfer, RateSnapshot, Session, Tag, TransferRecord, User,
    UserId,
};

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    tag: Option<Tag>,
    password_hash: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, StoredUser>,
    sessions: HashMap<String, Session>,
    rates: Vec<RateSnapshot>,
    balances: Vec<BalanceSnapshot>,
    transfers: Vec<TransferRecord>,
}

impl MemoryState {
    fn latest_balance(&self, user: UserId) -> Option<BalanceSnapshot> {
        self.balances.iter().rev().find(|b| b.user_id == user).copied()
    }

    fn tag_owner(&self, tag: &Tag) -> Option<UserId> {
        self.users
            .iter()
            .find(|(_, u)| u.tag.as_ref() == Some(tag))
            .map(|(id, _)| *id)
    }

    fn next_user_id(&self) -> Result<UserId, PersistenceError> {
        let next = self.users.keys().next_back().map_or(1, |id| id.get().saturating_add(1));
        UserId::new(next).ok_or_else(|| PersistenceError::CorruptRow(format!("user id {next}")))
    }
}

/// Repository backend holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
    offline: Arc<AtomicBool>,
}

impl MemoryPersistence {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store going down (`false`) or coming back (`true`).
    ///
    /// While offline every operation fails with
    /// [`PersistenceError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, MemoryState>, PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable);
        }
        Ok(self.state.lock().await)
    }
}

#[async_trait]
impl RateRepository for MemoryPersistence {
    async fn insert_rates(&self, snapshot: &RateSnapshot) -> Result<(), PersistenceError> {
        self.lock().await?.rates.push(*snapshot);
        Ok(())
    }

    async fn latest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError> {
        let state = self.lock().await?;
        // max_by_key keeps the last of equal timestamps, i.e. the newest insert
        Ok(state.rates.iter().max_by_key(|r| r.taken_at).copied())
    }

    async fn rates_at_or_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<RateSnapshot>, PersistenceError> {
        let state = self.lock().await?;
        Ok(state
            .rates
            .iter()
            .filter(|r| r.taken_at <= cutoff)
            .max_by_key(|r| r.taken_at)
            .copied())
    }

    async fn oldest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError> {
        let state = self.lock().await?;
        Ok(state.rates.iter().min_by_key(|r| r.taken_at).copied())
    }
}

#[async_trait]
impl UserRepository for MemoryPersistence {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, PersistenceError> {
        let state = self.lock().await?;
        Ok(state.users.get(&id).map(|u| User {
            id,
            name: u.name.clone(),
            tag: u.tag.clone(),
        }))
    }

    async fn find_credentials(
        &self,
        tag: &Tag,
    ) -> Result<Option<(User, String)>, PersistenceError> {
        let state = self.lock().await?;
        let Some(id) = state.tag_owner(tag) else {
            return Ok(None);
        };
        Ok(state.users.get(&id).and_then(|u| {
            let hash = u.password_hash.clone()?;
            let user = User {
                id,
                name: u.name.clone(),
                tag: u.tag.clone(),
            };
            Some((user, hash))
        }))
    }

    async fn find_user_id_by_tag(&self, tag: &Tag) -> Result<Option<UserId>, PersistenceError> {
        Ok(self.lock().await?.tag_owner(tag))
    }

    async fn tag_taken(
        &self,
        tag: &Tag,
        except: Option<UserId>,
    ) -> Result<bool, PersistenceError> {
        let owner = self.lock().await?.tag_owner(tag);
        Ok(owner.is_some() && owner != except)
    }

    async fn create_user(
        &self,
        name: &str,
        tag: &Tag,
        password_hash: &str,
    ) -> Result<UserId, PersistenceError> {
        let mut state = self.lock().await?;
        if state.tag_owner(tag).is_some() {
            return Err(PersistenceError::TagTaken);
        }
        let id = state.next_user_id()?;
        state.users.insert(
            id,
            StoredUser {
                name: name.to_string(),
                tag: Some(tag.clone()),
                password_hash: Some(password_hash.to_string()),
            },
        );
        Ok(id)
    }

    async fn upsert_name(&self, id: UserId, name: &str) -> Result<(), PersistenceError> {
        let mut state = self.lock().await?;
        state
            .users
            .entry(id)
            .and_modify(|u| u.name = name.to_string())
            .or_insert_with(|| StoredUser {
                name: name.to_string(),
                tag: None,
                password_hash: None,
            });
        Ok(())
    }

    async fn set_tag(&self, id: UserId, tag: &Tag) -> Result<(), PersistenceError> {
        let mut state = self.lock().await?;
        if state.tag_owner(tag).is_some_and(|owner| owner != id) {
            return Err(PersistenceError::TagTaken);
        }
        if let Some(user) = state.users.get_mut(&id) {
            user.tag = Some(tag.clone());
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), PersistenceError> {
        if let Some(user) = self.lock().await?.users.get_mut(&id) {
            user.password_hash = Some(hash.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryPersistence {
    async fn insert_session(&self, session: &Session) -> Result<(), PersistenceError> {
        self.lock()
            .await?
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, PersistenceError> {
        Ok(self.lock().await?.sessions.get(token).cloned())
    }
}

#[async_trait]
impl LedgerRepository for MemoryPersistence {
    async fn latest_balance(
        &self,
        user: UserId,
    ) -> Result<Option<BalanceSnapshot>, PersistenceError> {
        Ok(self.lock().await?.latest_balance(user))
    }

    async fn insert_balance(
        &self,
        user: UserId,
        balances: &Balances,
    ) -> Result<BalanceSnapshot, PersistenceError> {
        let snapshot = BalanceSnapshot {
            user_id: user,
            taken_at: Utc::now(),
            balances: *balances,
        };
        self.lock().await?.balances.push(snapshot);
        Ok(snapshot)
    }

    async fn transfer_history(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, PersistenceError> {
        let state = self.lock().await?;
        Ok(state
            .transfers
            .iter()
            .rev()
            .filter(|t| t.from == user || t.to == user)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .copied()
            .collect())
    }

    async fn begin_transfer(
        &self,
        _from: UserId,
        _to: UserId,
    ) -> Result<Box<dyn LedgerTransaction>, PersistenceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable);
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryLedgerTransaction {
            guard,
            offline: Arc::clone(&self.offline),
            balances: Vec::new(),
            transfers: Vec::new(),
        }))
    }
}

/// Buffered writes applied to the locked state on commit.
struct MemoryLedgerTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    offline: Arc<AtomicBool>,
    balances: Vec<BalanceSnapshot>,
    transfers: Vec<NewTransfer>,
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn latest_balance(
        &mut self,
        user: UserId,
    ) -> Result<Option<BalanceSnapshot>, PersistenceError> {
        let pending = self.balances.iter().rev().find(|b| b.user_id == user).copied();
        Ok(pending.or_else(|| self.guard.latest_balance(user)))
    }

    async fn insert_balance(
        &mut self,
        user: UserId,
        balances: &Balances,
    ) -> Result<(), PersistenceError> {
        self.balances.push(BalanceSnapshot {
            user_id: user,
            taken_at: Utc::now(),
            balances: *balances,
        });
        Ok(())
    }

    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, PersistenceError> {
        self.transfers.push(*transfer);
        let id = i64::try_from(self.guard.transfers.len() + self.transfers.len())
            .map_err(|e| PersistenceError::CorruptRow(e.to_string()))?;
        Ok(TransferRecord {
            id,
            from: transfer.from,
            to: transfer.to,
            asset: transfer.asset,
            amount: transfer.amount,
            created_at: Utc::now(),
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        let Self {
            mut guard,
            offline,
            balances,
            transfers,
        } = *self;
        if offline.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable);
        }
        let now = Utc::now();
        let state = &mut *guard;
        state.balances.extend(balances);
        for t in transfers {
            let id = i64::try_from(state.transfers.len() + 1)
                .map_err(|e| PersistenceError::CorruptRow(e.to_string()))?;
            state.transfers.push(TransferRecord {
                id,
                from: t.from,
                to: t.to,
                asset: t.asset,
                amount: t.amount,
                created_at: now,
            });
        }
        Ok(())
    }
}
