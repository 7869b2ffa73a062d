//! Job trait and built-in jobs.

pub mod bin_sweep;

use async_trait::async_trait;
use serde_json::Value;

use drive_core::error::AppError;

pub use bin_sweep::BinSweepJob;

/// A job run by the [`CronScheduler`](crate::CronScheduler).
#[async_trait]
pub trait ScheduledJob: Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Cron expression with a seconds field.
    fn schedule(&self) -> &str;

    /// Run the job once and summarize what it did.
    async fn run(&self) -> Result<Value, JobExecutionError>;
}

/// Error from a job run
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Transient failure, retried on the next tick
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}
