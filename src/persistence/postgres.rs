//! PostgreSQL implementation of the repository traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::models::{self, BalanceRow, RatesRow, SessionRow, TransferRow, UserRow};
use super::{
    LedgerRepository, LedgerTransaction, PersistenceError, RateRepository, SessionRepository,
    UserRepository,
};
use crate::config::AppConfig;
use crate::domain::{
    BalanceSnapshot, Balances, NewTransfer, RateSnapshot, Session, Tag, TransferRecord, User,
    UserId,
};

const SELECT_RATES: &str = "SELECT upd_date, usdt, btc, eth, sol, trx, ton, blink FROM rates";

const SELECT_BALANCE: &str = "SELECT user_id, upd_date, usdt_balance, btc_balance, eth_balance, \
     sol_balance, trx_balance, ton_balance, blink_balance FROM balances \
     WHERE user_id = $1 ORDER BY upd_date DESC, id DESC LIMIT 1";

const INSERT_BALANCE: &str = "INSERT INTO balances (user_id, upd_date, usdt_balance, btc_balance, \
     eth_balance, sol_balance, trx_balance, ton_balance, blink_balance) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

/// PostgreSQL-backed persistence using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a persistence layer over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a bounded pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] if the database cannot be reached or
    /// the schema cannot be migrated.
    pub async fn connect(config: &AppConfig) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .max_lifetime(Duration::from_secs(config.database_max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

/// Maps a unique-index violation on `users.tag` to [`PersistenceError::TagTaken`].
fn tag_conflict(err: sqlx::Error) -> PersistenceError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint().is_none_or(|c| c.contains("tag")) =>
        {
            PersistenceError::TagTaken
        }
        _ => PersistenceError::Database(err),
    }
}

#[async_trait]
impl RateRepository for PostgresPersistence {
    async fn insert_rates(&self, snapshot: &RateSnapshot) -> Result<(), PersistenceError> {
        let p = &snapshot.prices;
        sqlx::query(
            "INSERT INTO rates (upd_date, usdt, btc, eth, sol, trx, ton, blink) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(snapshot.taken_at)
        .bind(p.usdt)
        .bind(p.btc)
        .bind(p.eth)
        .bind(p.sol)
        .bind(p.trx)
        .bind(p.ton)
        .bind(p.blink)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError> {
        let row = sqlx::query_as::<_, RatesRow>(&format!(
            "{SELECT_RATES} ORDER BY upd_date DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(models::rate_snapshot))
    }

    async fn rates_at_or_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<RateSnapshot>, PersistenceError> {
        let row = sqlx::query_as::<_, RatesRow>(&format!(
            "{SELECT_RATES} WHERE upd_date <= $1 ORDER BY upd_date DESC, id DESC LIMIT 1"
        ))
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(models::rate_snapshot))
    }

    async fn oldest_rates(&self) -> Result<Option<RateSnapshot>, PersistenceError> {
        let row = sqlx::query_as::<_, RatesRow>(&format!(
            "{SELECT_RATES} ORDER BY upd_date ASC, id ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(models::rate_snapshot))
    }
}

#[async_trait]
impl UserRepository for PostgresPersistence {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, PersistenceError> {
        sqlx::query_as::<_, UserRow>("SELECT user_id, name, tag FROM users WHERE user_id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .map(models::user)
            .transpose()
    }

    async fn find_credentials(
        &self,
        tag: &Tag,
    ) -> Result<Option<(User, String)>, PersistenceError> {
        let row = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>)>(
            "SELECT user_id, name, tag, password_hash FROM users WHERE tag = $1",
        )
        .bind(tag.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            // Users created lazily through the profile endpoint have no password.
            Some((id, name, tag, Some(hash))) => Ok(Some((models::user((id, name, tag))?, hash))),
            _ => Ok(None),
        }
    }

    async fn find_user_id_by_tag(&self, tag: &Tag) -> Result<Option<UserId>, PersistenceError> {
        let id = sqlx::query_scalar::<_, i64>("SELECT user_id FROM users WHERE tag = $1")
            .bind(tag.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id.and_then(UserId::new))
    }

    async fn tag_taken(
        &self,
        tag: &Tag,
        except: Option<UserId>,
    ) -> Result<bool, PersistenceError> {
        let found = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM users WHERE tag = $1 AND ($2::BIGINT IS NULL OR user_id <> $2) LIMIT 1",
        )
        .bind(tag.as_str())
        .bind(except.map(UserId::get))
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn create_user(
        &self,
        name: &str,
        tag: &Tag,
        password_hash: &str,
    ) -> Result<UserId, PersistenceError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, tag, password_hash) VALUES ($1, $2, $3) RETURNING user_id",
        )
        .bind(name)
        .bind(tag.as_str())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(tag_conflict)?;

        UserId::new(id).ok_or_else(|| PersistenceError::CorruptRow(format!("user id {id}")))
    }

    async fn upsert_name(&self, id: UserId, name: &str) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (user_id, name) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(id.get())
        .bind(name)
        .execute(&mut *tx)
        .await?;

        // Explicit ids bypass the serial; keep it ahead of them so later
        // registrations do not collide.
        sqlx::query(
            "SELECT setval(pg_get_serial_sequence('users', 'user_id'), \
             GREATEST((SELECT MAX(user_id) FROM users), 1))",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_tag(&self, id: UserId, tag: &Tag) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE users SET tag = $1 WHERE user_id = $2")
            .bind(tag.as_str())
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(tag_conflict)?;
        Ok(())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE user_id = $2")
            .bind(hash)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PostgresPersistence {
    async fn insert_session(&self, session: &Session) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token)
        .bind(session.user_id.get())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>, PersistenceError> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(models::session)
        .transpose()
    }
}

#[async_trait]
impl LedgerRepository for PostgresPersistence {
    async fn latest_balance(
        &self,
        user: UserId,
    ) -> Result<Option<BalanceSnapshot>, PersistenceError> {
        sqlx::query_as::<_, BalanceRow>(SELECT_BALANCE)
            .bind(user.get())
            .fetch_optional(&self.pool)
            .await?
            .map(models::balance_snapshot)
            .transpose()
    }

    async fn insert_balance(
        &self,
        user: UserId,
        balances: &Balances,
    ) -> Result<BalanceSnapshot, PersistenceError> {
        let taken_at = Utc::now();
        bind_balance(sqlx::query(INSERT_BALANCE), user, taken_at, balances)
            .execute(&self.pool)
            .await?;
        Ok(BalanceSnapshot {
            user_id: user,
            taken_at,
            balances: *balances,
        })
    }

    async fn transfer_history(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, PersistenceError> {
        sqlx::query_as::<_, TransferRow>(
            "SELECT id, from_user_id, to_user_id, symbol, amount, date FROM transfers \
             WHERE from_user_id = $1 OR to_user_id = $1 ORDER BY date DESC, id DESC LIMIT $2",
        )
        .bind(user.get())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(models::transfer_record)
        .collect()
    }

    async fn begin_transfer(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Box<dyn LedgerTransaction>, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        // Advisory locks are released at commit or rollback. Taking them in
        // ascending id order keeps two opposite transfers from deadlocking.
        let (first, second) = if from <= to { (from, to) } else { (to, from) };
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(first.get())
            .execute(&mut *tx)
            .await?;
        if second != first {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(second.get())
                .execute(&mut *tx)
                .await?;
        }

        Ok(Box::new(PgLedgerTransaction { tx }))
    }
}

fn bind_balance<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    user: UserId,
    taken_at: DateTime<Utc>,
    b: &Balances,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(user.get())
        .bind(taken_at)
        .bind(b.usdt)
        .bind(b.btc)
        .bind(b.eth)
        .bind(b.sol)
        .bind(b.trx)
        .bind(b.ton)
        .bind(b.blink)
}

/// A transfer scope backed by a PostgreSQL transaction.
struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn latest_balance(
        &mut self,
        user: UserId,
    ) -> Result<Option<BalanceSnapshot>, PersistenceError> {
        sqlx::query_as::<_, BalanceRow>(SELECT_BALANCE)
            .bind(user.get())
            .fetch_optional(&mut *self.tx)
            .await?
            .map(models::balance_snapshot)
            .transpose()
    }

    async fn insert_balance(
        &mut self,
        user: UserId,
        balances: &Balances,
    ) -> Result<(), PersistenceError> {
        bind_balance(sqlx::query(INSERT_BALANCE), user, Utc::now(), balances)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<TransferRecord, PersistenceError> {
        let created_at = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO transfers (from_user_id, to_user_id, symbol, amount, date) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(transfer.from.get())
        .bind(transfer.to.get())
        .bind(transfer.asset.symbol())
        .bind(transfer.amount)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(TransferRecord {
            id,
            from: transfer.from,
            to: transfer.to,
            asset: transfer.asset,
            amount: transfer.amount,
            created_at,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.commit().await?;
        Ok(())
    }
}
