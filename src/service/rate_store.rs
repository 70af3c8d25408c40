//! Two-tier rate storage and the `/rates` read path.
//!
//! Every snapshot goes to the `rates` table and to the rate file. Reads
//! prefer the table; the file is the fallback when the table is empty or
//! unreachable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Asset, Prices, RateSnapshot, compute_roi};
use crate::error::WalletError;
use crate::persistence::Persistence;
use crate::persistence::rate_file::RateFile;

/// Age of the baseline snapshot used for ROI.
pub const DAILY_LOOKBACK_HOURS: i64 = 24;

/// Which tier served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// The `rates` table.
    Database,
    /// The rate file.
    File,
}

/// Result of a `/rates` read.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesView {
    /// Latest prices.
    pub current: Prices,
    /// Baseline prices, roughly a day old.
    pub daily: Prices,
    /// Percent change per asset; assets without a usable baseline are absent.
    pub roi: BTreeMap<Asset, f64>,
    /// Tier that served `current`.
    pub source: RateSource,
}

/// Which tiers accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The row was inserted. `false` also when there is no database tier.
    pub database: bool,
    /// The file was replaced.
    pub file: bool,
}

impl RecordOutcome {
    /// At least one tier holds the snapshot.
    #[must_use]
    pub const fn any(self) -> bool {
        self.database || self.file
    }
}

/// Rate snapshot store over an optional database and the rate file.
#[derive(Debug, Clone)]
pub struct RateStore {
    db: Option<Arc<dyn Persistence>>,
    file: RateFile,
}

impl RateStore {
    /// Creates the store. Pass `None` for `db` to run file-only.
    #[must_use]
    pub fn new(db: Option<Arc<dyn Persistence>>, file: RateFile) -> Self {
        Self { db, file }
    }

    /// The file tier.
    #[must_use]
    pub const fn file(&self) -> &RateFile {
        &self.file
    }

    /// Writes `snapshot` to both tiers. Each write is independent and
    /// best-effort; failures are logged and reported in the outcome.
    pub async fn record(&self, snapshot: &RateSnapshot) -> RecordOutcome {
        let database = match &self.db {
            Some(db) => match db.insert_rates(snapshot).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to insert rate snapshot");
                    false
                }
            },
            None => false,
        };

        let file = match self.file.write(&snapshot.prices).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.file.path().display(),
                    "failed to write rate file"
                );
                false
            }
        };

        RecordOutcome { database, file }
    }

    /// Current prices, the daily baseline and ROI.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::RatesUnavailable`] if neither tier holds a
    /// snapshot.
    pub async fn current(&self) -> Result<RatesView, WalletError> {
        if let Some(db) = &self.db {
            match db.latest_rates().await {
                Ok(Some(latest)) => {
                    let daily = self.daily(db.as_ref(), Utc::now(), &latest.prices).await;
                    let roi = compute_roi(&latest.prices, &daily);
                    return Ok(RatesView {
                        current: latest.prices,
                        daily,
                        roi,
                        source: RateSource::Database,
                    });
                }
                Ok(None) => tracing::debug!("rates table empty, reading rate file"),
                Err(e) => tracing::warn!(error = %e, "rates lookup failed, reading rate file"),
            }
        }

        match self.file.read().await {
            Ok(Some(prices)) => Ok(RatesView {
                current: prices,
                daily: prices,
                roi: BTreeMap::new(),
                source: RateSource::File,
            }),
            Ok(None) => Err(WalletError::RatesUnavailable),
            Err(e) => {
                tracing::warn!(error = %e, "rate file unreadable");
                Err(WalletError::RatesUnavailable)
            }
        }
    }

    /// Most recent snapshot at least a day old, else the oldest, else
    /// `current` itself.
    async fn daily(&self, db: &dyn Persistence, now: DateTime<Utc>, current: &Prices) -> Prices {
        let cutoff = now - Duration::hours(DAILY_LOOKBACK_HOURS);
        match db.rates_at_or_before(cutoff).await {
            Ok(Some(row)) => return row.prices,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "daily rates lookup failed"),
        }
        match db.oldest_rates().await {
            Ok(Some(row)) => row.prices,
            Ok(None) => *current,
            Err(e) => {
                tracing::warn!(error = %e, "oldest rates lookup failed");
                *current
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::AssetMap;
    use crate::persistence::RateRepository;
    use crate::persistence::memory::MemoryPersistence;

    fn prices(btc: f64) -> Prices {
        AssetMap::from_fn(|a| a.fixed_price().unwrap_or(btc))
    }

    fn temp_file() -> (tempfile::TempDir, RateFile) {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let file = RateFile::new(dir.path().join("rates.json"));
        (dir, file)
    }

    #[tokio::test]
    async fn record_writes_both_tiers() {
        let (_dir, file) = temp_file();
        let db = MemoryPersistence::new();
        let store = RateStore::new(Some(Arc::new(db.clone())), file.clone());

        let snapshot = RateSnapshot {
            taken_at: Utc::now(),
            prices: prices(50_000.0),
        };
        let outcome = store.record(&snapshot).await;
        assert_eq!(outcome, RecordOutcome { database: true, file: true });
        assert!(matches!(db.latest_rates().await, Ok(Some(s)) if s == snapshot));
        assert!(matches!(file.read().await, Ok(Some(p)) if p == snapshot.prices));
    }

    #[tokio::test]
    async fn record_survives_database_outage() {
        let (_dir, file) = temp_file();
        let db = MemoryPersistence::new();
        db.set_available(false);
        let store = RateStore::new(Some(Arc::new(db)), file.clone());

        let outcome = store
            .record(&RateSnapshot {
                taken_at: Utc::now(),
                prices: prices(1.0),
            })
            .await;
        assert_eq!(outcome, RecordOutcome { database: false, file: true });
    }

    #[tokio::test]
    async fn roi_against_day_old_snapshot() {
        let (_dir, file) = temp_file();
        let db = MemoryPersistence::new();
        let now = Utc::now();
        let _ = db
            .insert_rates(&RateSnapshot {
                taken_at: now - Duration::hours(25),
                prices: prices(100.0),
            })
            .await;
        let _ = db
            .insert_rates(&RateSnapshot {
                taken_at: now,
                prices: prices(110.0),
            })
            .await;
        let store = RateStore::new(Some(Arc::new(db)), file);

        let Ok(view) = store.current().await else {
            panic!("rates expected");
        };
        assert_eq!(view.source, RateSource::Database);
        assert!((view.daily.btc - 100.0).abs() < f64::EPSILON);
        assert!((view.roi[&Asset::Btc] - 10.0).abs() < 1e-9);
        assert!(view.roi[&Asset::Usdt].abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn young_history_uses_oldest_row() {
        let (_dir, file) = temp_file();
        let db = MemoryPersistence::new();
        let now = Utc::now();
        for (minutes, btc) in [(30, 200.0), (0, 300.0)] {
            let _ = db
                .insert_rates(&RateSnapshot {
                    taken_at: now - Duration::minutes(minutes),
                    prices: prices(btc),
                })
                .await;
        }
        let store = RateStore::new(Some(Arc::new(db)), file);

        let Ok(view) = store.current().await else {
            panic!("rates expected");
        };
        assert!((view.daily.btc - 200.0).abs() < f64::EPSILON);
        assert!((view.roi[&Asset::Btc] - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn database_down_serves_file_without_roi() {
        let (_dir, file) = temp_file();
        let _ = file.write(&prices(42.0)).await;
        let db = MemoryPersistence::new();
        db.set_available(false);
        let store = RateStore::new(Some(Arc::new(db)), file);

        let Ok(view) = store.current().await else {
            panic!("file fallback expected");
        };
        assert_eq!(view.source, RateSource::File);
        assert_eq!(view.current, view.daily);
        assert!(view.roi.is_empty());
    }

    #[tokio::test]
    async fn file_only_store_reads_file() {
        let (_dir, file) = temp_file();
        let _ = file.write(&prices(7.0)).await;
        let store = RateStore::new(None, file);
        assert!(matches!(store.current().await, Ok(v) if v.source == RateSource::File));
    }

    #[tokio::test]
    async fn nothing_anywhere_is_unavailable() {
        let (_dir, file) = temp_file();
        let store = RateStore::new(Some(Arc::new(MemoryPersistence::new())), file);
        assert!(matches!(store.current().await, Err(WalletError::RatesUnavailable)));
    }
}
