//! Cron scheduler for periodic jobs.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use drive_core::error::AppError;

use crate::jobs::ScheduledJob;

/// Cron-based scheduler for periodic background jobs
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler })
    }

    /// Register a job on its own schedule.
    ///
    /// A tick that fires while the previous run is still going is skipped.
    pub async fn register(&self, job: Arc<dyn ScheduledJob>) -> Result<(), AppError> {
        let name = job.name().to_string();
        let schedule = job.schedule().to_string();
        let running = Arc::new(Mutex::new(()));

        let cron_job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let job = Arc::clone(&job);
            let running = Arc::clone(&running);
            Box::pin(async move {
                let Ok(_guard) = running.try_lock() else {
                    tracing::warn!(job = job.name(), "Previous run still in progress, skipping");
                    return;
                };
                match job.run().await {
                    Ok(summary) => tracing::info!(job = job.name(), %summary, "Job finished"),
                    Err(e) => tracing::error!(job = job.name(), error = %e, "Job failed"),
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid schedule '{}' for {}: {}", schedule, name, e))
        })?;

        self.scheduler
            .add(cron_job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;

        tracing::info!(job = %name, schedule = %schedule, "Registered scheduled job");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
