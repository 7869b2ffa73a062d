//! JWT claims structure carried by every bearer token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use drive_core::traits::Identity;
use drive_core::types::{EntryId, UserId};

/// JWT claims payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID.
    pub sub: UserId,
    /// Username at the time of issuance.
    pub username: String,
    /// Root directory of the user's drive.
    pub drive: EntryId,
    /// Root directory of the user's bin.
    pub bin: EntryId,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Unique token ID.
    pub jti: Uuid,
}

impl Claims {
    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    /// The identity the token vouches for.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            drive_id: self.drive,
            bin_id: self.bin,
        }
    }
}
