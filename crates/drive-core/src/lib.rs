//! # drive-core
//!
//! Core crate for the cloud drive. Contains the unified error system,
//! typed identifiers, configuration schemas, and the traits that seam the
//! drive services to object storage and identity verification.
//!
//! This crate has **no** internal dependencies on other drive crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
