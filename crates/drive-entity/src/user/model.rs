//! User entity model.

use chrono::{DateTime, Utc};
use drive_core::types::{EntryId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Argon2 password hash (PHC string).
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Bytes currently charged against the quota.
    pub used_space: i64,
    /// Root directory of the user's drive.
    pub drive_id: EntryId,
    /// Root directory of the user's bin.
    pub bin_id: EntryId,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
