//! Batch uploads of files and folders.

pub mod plan;
pub mod service;

pub use plan::{UploadItem, UploadPlan};
pub use service::{UploadService, UploadedEntry};
