//! StudyHub Node — local synchronization node
//!
//! Wires the in-memory Presence Store, a Durable Ledger backend, the sweep
//! worker, and one simulated room session into a single process. Useful for
//! exercising the whole engine locally; a production client embeds
//! `studyhub-sync` against a real store backend instead.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use studyhub_core::config::AppConfig;
use studyhub_core::error::AppError;
use studyhub_core::traits::ledger::LedgerApi;
use studyhub_core::traits::{Clock, SystemClock};
use studyhub_core::types::RoomId;
use studyhub_ledger::{LedgerClient, MemoryLedger};
use studyhub_store::MemoryPresenceStore;
use studyhub_sync::{RoomSession, SessionIdentity, SyncEvent};
use studyhub_worker::CronScheduler;

#[tokio::main]
async fn main() {
    let env = std::env::var("STUDYHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Node error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main node run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting StudyHub node v{}", env!("CARGO_PKG_VERSION"));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = MemoryPresenceStore::new(Arc::clone(&clock));

    // `base_url = "memory"` selects the in-memory ledger for fully local runs.
    let ledger: Arc<dyn LedgerApi> =
        if config.ledger.base_url.is_empty() || config.ledger.base_url == "memory" {
            tracing::info!("Using the in-memory ledger");
            MemoryLedger::new(Arc::clone(&clock))
        } else {
            tracing::info!(url = %config.ledger.base_url, "Using the HTTP ledger");
            Arc::new(LedgerClient::new(&config.ledger)?)
        };

    // The worker gets its own connection: cleanup must not depend on any
    // client session staying alive.
    let mut scheduler = if config.worker.enabled {
        let scheduler = CronScheduler::new(store.connect(), config.clone()).await?;
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        tracing::info!("Sweep worker disabled");
        None
    };

    // One simulated session so a local run exercises the full engine.
    let identity = SessionIdentity {
        uid: studyhub_core::types::UserId::new(),
        username: std::env::var("STUDYHUB_USERNAME").unwrap_or_else(|_| "local".to_string()),
        photo_url: None,
        is_beast_mode: false,
    };
    let room = RoomId::new();
    let session = RoomSession::join(identity, room, store.connect(), ledger, config).await?;
    session.accounting().start_session().await;

    let mut events = session.events();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::TimerTick { .. } => tracing::trace!(?event, "sync event"),
                _ => tracing::debug!(?event, "sync event"),
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, leaving room...");

    session.leave().await;
    event_log.abort();
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }

    tracing::info!("StudyHub node shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
