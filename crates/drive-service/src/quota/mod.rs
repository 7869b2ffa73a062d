//! Per-user storage quota.

pub mod service;

pub use service::{QuotaService, UploadName};
