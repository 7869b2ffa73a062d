//! Request context carrying the authenticated caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drive_core::traits::Identity;
use drive_core::types::{EntryId, UserId};

/// Context for the current authenticated request.
///
/// Built from a verified [`Identity`] and passed into service methods so
/// that every operation knows *who* is acting and where their roots are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: UserId,
    /// Root directory of the caller's drive.
    pub drive_id: EntryId,
    /// Root directory of the caller's bin.
    pub bin_id: EntryId,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a context for a verified identity.
    pub fn new(identity: Identity) -> Self {
        Self {
            user_id: identity.user_id,
            drive_id: identity.drive_id,
            bin_id: identity.bin_id,
            request_time: Utc::now(),
        }
    }
}

impl From<Identity> for RequestContext {
    fn from(identity: Identity) -> Self {
        Self::new(identity)
    }
}
