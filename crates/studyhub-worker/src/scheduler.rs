//! Cron scheduler for the presence maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use studyhub_core::config::AppConfig;
use studyhub_core::traits::store::PresenceStore;
use studyhub_core::{AppError, AppResult};

use crate::reconcile;
use crate::sweep;

/// Cron-based scheduler for the sweep and reconciliation tasks.
///
/// Runs on its own store connection so cleanup never depends on any client
/// staying alive.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Store connection the tasks run against
    store: Arc<dyn PresenceStore>,
    /// Application configuration (schedules and thresholds)
    config: AppConfig,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(store: Arc<dyn PresenceStore>, config: AppConfig) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            store,
            config,
        })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self) -> AppResult<()> {
        self.register_stale_sweep().await?;
        self.register_community_reconcile().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Stale-participant sweep, on the configured schedule
    async fn register_stale_sweep(&self) -> AppResult<()> {
        let store = Arc::clone(&self.store);
        let room_config = self.config.room.clone();
        let schedule = self.config.worker.sweep_schedule.clone();

        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let store = Arc::clone(&store);
            let room_config = room_config.clone();
            Box::pin(async move {
                tracing::debug!("Running stale participant sweep");
                if let Err(e) = sweep::sweep_stale_participants(&store, &room_config).await {
                    tracing::error!("Stale participant sweep failed: {}", e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create sweep schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add sweep schedule: {}", e)))?;

        tracing::info!(schedule = %self.config.worker.sweep_schedule, "Registered: stale_sweep");
        Ok(())
    }

    /// Community record reconciliation, on the configured schedule
    async fn register_community_reconcile(&self) -> AppResult<()> {
        let store = Arc::clone(&self.store);
        let presence_config = self.config.presence.clone();
        let schedule = self.config.worker.reconcile_schedule.clone();

        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let store = Arc::clone(&store);
            let presence_config = presence_config.clone();
            Box::pin(async move {
                tracing::debug!("Running community presence reconciliation");
                if let Err(e) = reconcile::reconcile_community(&store, &presence_config).await {
                    tracing::error!("Community reconciliation failed: {}", e);
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create reconcile schedule: {}", e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add reconcile schedule: {}", e)))?;

        tracing::info!(
            schedule = %self.config.worker.reconcile_schedule,
            "Registered: community_reconcile"
        );
        Ok(())
    }
}
