//! # drive-database
//!
//! The [`DriveStore`] seam used by every drive service, its PostgreSQL
//! implementation built from per-table repositories, and an in-memory
//! implementation with the same constraint semantics.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryDriveStore;
pub use repositories::PgDriveStore;
pub use store::DriveStore;
