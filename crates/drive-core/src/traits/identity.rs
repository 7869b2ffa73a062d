//! Identity seam between the transport layer and the drive services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::{EntryId, UserId};

/// The verified caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Root directory of the user's drive.
    pub drive_id: EntryId,
    /// Root directory of the user's bin.
    pub bin_id: EntryId,
}

/// Verifies bearer credentials and yields the caller identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Verify `token` and return the identity it carries.
    ///
    /// Invalid, tampered, or expired tokens fail with
    /// [`ErrorKind::Authentication`](crate::ErrorKind::Authentication).
    async fn verify(&self, token: &str) -> AppResult<Identity>;
}
