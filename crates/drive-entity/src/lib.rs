//! # drive-entity
//!
//! Domain entity models for the cloud drive. Every struct in this crate
//! represents a database table row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! entities additionally derive `sqlx::FromRow`.

pub mod bin;
pub mod change;
pub mod entry;
pub mod permission;
pub mod share;
pub mod storage;
pub mod user;
