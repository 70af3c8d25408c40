//! blink-wallet server entry point.
//!
//! Starts the rate fetcher and the Axum HTTP server, and shuts both down on
//! Ctrl-C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use blink_wallet::api;
use blink_wallet::app_state::AppState;
use blink_wallet::config::{AppConfig, PersistenceMode};
use blink_wallet::persistence::Persistence;
use blink_wallet::persistence::memory::MemoryPersistence;
use blink_wallet::persistence::postgres::PostgresPersistence;
use blink_wallet::persistence::rate_file::RateFile;
use blink_wallet::service::{
    CoinGeckoOracle, PasswordHasher, RateFetcher, RateStore, WalletServices,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);
    tracing::info!(addr = %config.listen_addr, "starting blink-wallet");

    let (db, persistence) = open_persistence(&config).await;

    let rates = Arc::new(RateStore::new(
        db.clone(),
        RateFile::new(config.rates_file.clone()),
    ));
    let wallet = db.map(|db| {
        Arc::new(WalletServices::new(
            db,
            PasswordHasher::default(),
            config.default_name.clone(),
        ))
    });

    let shutdown = CancellationToken::new();
    let oracle = CoinGeckoOracle::new(
        config.rates_api_url.clone(),
        Duration::from_secs(config.rates_fetch_timeout_secs),
    )?;
    let fetcher = RateFetcher::new(
        Arc::new(oracle),
        Arc::clone(&rates),
        Duration::from_secs(config.rates_fetch_interval_secs),
        Duration::from_secs(config.rates_fetch_timeout_secs),
    );
    let fetcher_task = tokio::spawn(fetcher.run(shutdown.clone()));

    let app_state = AppState {
        rates,
        wallet,
        persistence,
    };
    let app = api::build_app(app_state, &config.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        persistence = persistence.as_str(),
        "server listening"
    );

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = fetcher_task.await {
        tracing::warn!(error = %e, "rate fetcher task ended abnormally");
    }
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Opens the configured backend. A PostgreSQL connection or migration
/// failure degrades to running without persistence.
async fn open_persistence(
    config: &AppConfig,
) -> (Option<Arc<dyn Persistence>>, PersistenceMode) {
    match config.persistence_mode {
        PersistenceMode::Postgres => match PostgresPersistence::connect(config).await {
            Ok(pg) => (Some(Arc::new(pg)), PersistenceMode::Postgres),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "database unavailable, continuing without persistence"
                );
                (None, PersistenceMode::Disabled)
            }
        },
        PersistenceMode::Memory => {
            tracing::warn!("using in-memory persistence; data is lost on restart");
            (Some(Arc::new(MemoryPersistence::new())), PersistenceMode::Memory)
        }
        PersistenceMode::Disabled => {
            tracing::info!("persistence disabled; serving rates from file only");
            (None, PersistenceMode::Disabled)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
