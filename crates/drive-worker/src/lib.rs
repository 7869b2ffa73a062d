//! Scheduled background jobs for the cloud drive.
//!
//! This crate provides:
//! - A cron scheduler that runs registered jobs on their schedules
//! - The bin sweep job deleting entries past the retention window

pub mod jobs;
pub mod scheduler;

pub use jobs::{BinSweepJob, JobExecutionError, ScheduledJob};
pub use scheduler::CronScheduler;
