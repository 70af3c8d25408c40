//! Background task that refreshes rates from the external price oracle.
//!
//! Every interval the fetcher asks the oracle for USD quotes of the tracked
//! assets, overlays the fixed local prices and hands the complete snapshot
//! to [`RateStore::record`]. A failed cycle is logged and skipped; the
//! previous snapshot stays the latest one. There is no backoff.
//!
//! Shutdown goes through a `tokio_util::sync::CancellationToken`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{Asset, AssetMap, Prices, RateSnapshot};
use crate::service::rate_store::RateStore;

/// USD quotes keyed by oracle id (`bitcoin`, `solana`, ...).
pub type OracleQuotes = HashMap<String, f64>;

/// Why a fetch cycle produced no snapshot.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport, HTTP status or body decoding failure.
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The oracle did not answer within the configured timeout.
    #[error("oracle request timed out")]
    Timeout,

    /// The response lacked a usable quote for a tracked asset.
    #[error("no quote for {0}")]
    MissingQuote(Asset),

    /// Neither the database nor the rate file accepted the snapshot.
    #[error("snapshot not recorded by any tier")]
    NotRecorded,
}

/// Source of external USD prices.
#[async_trait]
pub trait PriceOracle: Send + Sync + Debug {
    /// Fetches current quotes for every tracked asset.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] on any request or decoding failure.
    async fn quotes(&self) -> Result<OracleQuotes, FetchError>;
}

/// CoinGecko `simple/price` client.
#[derive(Debug, Clone)]
pub struct CoinGeckoOracle {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoOracle {
    /// Creates a client against `base_url` (e.g.
    /// `https://api.coingecko.com/api/v3`) with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn quotes(&self) -> Result<OracleQuotes, FetchError> {
        let ids = Asset::tracked()
            .filter_map(Asset::oracle_id)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/simple/price", self.base_url.trim_end_matches('/'));

        let body: HashMap<String, HashMap<String, f64>> = self
            .client
            .get(url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .into_iter()
            .filter_map(|(id, quote)| quote.get("usd").copied().map(|usd| (id, usd)))
            .collect())
    }
}

/// Builds a complete price map: fixed assets take their local price,
/// tracked assets their oracle quote.
///
/// # Errors
///
/// Returns [`FetchError::MissingQuote`] if a tracked asset has no finite
/// quote.
pub fn merge_fixed_prices(quotes: &OracleQuotes) -> Result<Prices, FetchError> {
    AssetMap::try_from_fn(|asset| {
        if let Some(fixed) = asset.fixed_price() {
            return Ok(fixed);
        }
        asset
            .oracle_id()
            .and_then(|id| quotes.get(id).copied())
            .filter(|price| price.is_finite())
            .ok_or(FetchError::MissingQuote(asset))
    })
}

/// Periodic rate refresher.
#[derive(Debug)]
pub struct RateFetcher {
    oracle: Arc<dyn PriceOracle>,
    store: Arc<RateStore>,
    interval: Duration,
    timeout: Duration,
}

impl RateFetcher {
    /// Creates a fetcher writing through `store`.
    #[must_use]
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        store: Arc<RateStore>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            store,
            interval,
            timeout,
        }
    }

    /// Runs until `shutdown` is cancelled. The first cycle starts
    /// immediately.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(fetcher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "rate fetcher starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                () = self.cycle() => {},
                () = shutdown.cancelled() => break,
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {},
                () = shutdown.cancelled() => break,
            }
        }

        info!("rate fetcher shutting down");
    }

    async fn cycle(&self) {
        match self.fetch_once().await {
            Ok(snapshot) => info!(
                btc = snapshot.prices.btc,
                eth = snapshot.prices.eth,
                "rates refreshed"
            ),
            Err(e) => warn!(error = %e, "rate fetch skipped"),
        }
    }

    /// Runs one fetch-merge-record cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the oracle fails, times out or omits a
    /// tracked asset, in which case nothing is recorded, or if no storage
    /// tier took the snapshot.
    pub async fn fetch_once(&self) -> Result<RateSnapshot, FetchError> {
        let quotes = tokio::time::timeout(self.timeout, self.oracle.quotes())
            .await
            .map_err(|_| FetchError::Timeout)??;
        let snapshot = RateSnapshot {
            taken_at: Utc::now(),
            prices: merge_fixed_prices(&quotes)?,
        };
        if !self.store.record(&snapshot).await.any() {
            return Err(FetchError::NotRecorded);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::persistence::rate_file::RateFile;

    fn full_quotes() -> OracleQuotes {
        [
            ("bitcoin", 60_000.0),
            ("ethereum", 3_000.0),
            ("solana", 150.0),
            ("tron", 0.12),
            ("the-open-network", 5.5),
        ]
        .into_iter()
        .map(|(id, p)| (id.to_string(), p))
        .collect()
    }

    #[derive(Debug)]
    struct StubOracle {
        quotes: Option<OracleQuotes>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubOracle {
        fn answering(quotes: Option<OracleQuotes>) -> Self {
            Self {
                quotes,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceOracle for StubOracle {
        async fn quotes(&self) -> Result<OracleQuotes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.quotes
                .clone()
                .ok_or(FetchError::MissingQuote(Asset::Btc))
        }
    }

    fn fetcher(oracle: StubOracle, dir: &tempfile::TempDir) -> (RateFetcher, RateFile) {
        let file = RateFile::new(dir.path().join("rates.json"));
        let store = Arc::new(RateStore::new(None, file.clone()));
        let fetcher = RateFetcher::new(
            Arc::new(oracle),
            store,
            Duration::from_secs(3600),
            Duration::from_millis(200),
        );
        (fetcher, file)
    }

    #[test]
    fn fixed_prices_override_quotes() {
        let mut quotes = full_quotes();
        quotes.insert("tether".to_string(), 0.98);
        let Ok(prices) = merge_fixed_prices(&quotes) else {
            panic!("merge failed");
        };
        assert!((prices.usdt - 1.0).abs() < f64::EPSILON);
        assert!((prices.blink - 100.0).abs() < f64::EPSILON);
        assert!((prices.ton - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_tracked_asset_fails_merge() {
        let mut quotes = full_quotes();
        quotes.remove("solana");
        assert!(matches!(
            merge_fixed_prices(&quotes),
            Err(FetchError::MissingQuote(Asset::Sol))
        ));
    }

    #[test]
    fn non_finite_quote_fails_merge() {
        let mut quotes = full_quotes();
        quotes.insert("tron".to_string(), f64::NAN);
        assert!(matches!(
            merge_fixed_prices(&quotes),
            Err(FetchError::MissingQuote(Asset::Trx))
        ));
    }

    #[tokio::test]
    async fn successful_cycle_writes_snapshot() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let (fetcher, file) = fetcher(StubOracle::answering(Some(full_quotes())), &dir);

        let Ok(snapshot) = fetcher.fetch_once().await else {
            panic!("cycle failed");
        };
        assert!((snapshot.prices.btc - 60_000.0).abs() < f64::EPSILON);
        assert!(matches!(file.read().await, Ok(Some(p)) if p == snapshot.prices));
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_snapshot() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let (fetcher, file) = fetcher(StubOracle::answering(None), &dir);
        let previous = merge_fixed_prices(&full_quotes());
        let Ok(previous) = previous else {
            panic!("merge failed");
        };
        let _ = file.write(&previous).await;

        assert!(fetcher.fetch_once().await.is_err());
        assert!(matches!(file.read().await, Ok(Some(p)) if p == previous));
    }

    #[tokio::test]
    async fn cycle_fails_when_no_tier_accepts_the_snapshot() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let blocker = dir.path().join("blocker");
        let Ok(()) = std::fs::write(&blocker, b"not a directory") else {
            panic!("write blocker");
        };
        let file = RateFile::new(blocker.join("rates.json"));
        let fetcher = RateFetcher::new(
            Arc::new(StubOracle::answering(Some(full_quotes()))),
            Arc::new(RateStore::new(None, file)),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );

        assert!(matches!(fetcher.fetch_once().await, Err(FetchError::NotRecorded)));
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let mut oracle = StubOracle::answering(Some(full_quotes()));
        oracle.delay = Duration::from_secs(5);
        let (fetcher, file) = fetcher(oracle, &dir);

        assert!(matches!(fetcher.fetch_once().await, Err(FetchError::Timeout)));
        assert!(matches!(file.read().await, Ok(None)));
    }

    #[tokio::test]
    async fn run_fetches_immediately_and_stops_on_cancel() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let (fetcher, file) = fetcher(StubOracle::answering(Some(full_quotes())), &dir);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(fetcher.run(shutdown.clone()));

        let mut written = false;
        for _ in 0..100 {
            if matches!(file.read().await, Ok(Some(_))) {
                written = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(written, "first cycle should run without waiting an interval");

        shutdown.cancel();
        assert!(
            tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_never_fetches() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let oracle = Arc::new(StubOracle::answering(Some(full_quotes())));
        let file = RateFile::new(dir.path().join("rates.json"));
        let fetcher = RateFetcher::new(
            Arc::clone(&oracle) as Arc<dyn PriceOracle>,
            Arc::new(RateStore::new(None, file)),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        );
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        fetcher.run(shutdown).await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}
