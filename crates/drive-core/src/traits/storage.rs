//! Object storage seam for file contents.
//!
//! The drive never streams file bytes itself. Clients upload and download
//! directly against presigned URLs, and the drive only tags objects so
//! that bucket lifecycle rules can reclaim binned content.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::{EntryId, UserId};

/// Tag key marking objects whose entries currently sit in a bin.
pub const BINNED_TAG: &str = "binned";

/// A presigned HTTP request a client can execute without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedRequest {
    /// Fully signed URL.
    pub url: String,
    /// HTTP method the signature is valid for.
    pub method: String,
    /// Headers the client must send verbatim.
    pub headers: BTreeMap<String, String>,
    /// Instant after which the signature is rejected.
    pub expires_at: DateTime<Utc>,
}

/// Trait for object storage backends.
///
/// Implemented in `drive-storage` by the S3 provider and by an in-memory
/// recorder used in tests.
#[async_trait]
pub trait ObjectStorage: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "s3", "memory").
    fn provider_type(&self) -> &str;

    /// Mint a PUT request for `key` that only accepts exactly `size` bytes.
    async fn presign_upload(&self, key: &str, size: i64) -> AppResult<PresignedRequest>;

    /// Mint a GET request for `key`.
    async fn presign_download(&self, key: &str) -> AppResult<PresignedRequest>;

    /// Set a single tag on the object at `key`, replacing its tag set.
    async fn tag_object(&self, key: &str, tag: &str, value: &str) -> AppResult<()>;
}

/// Object key holding the contents of a file entry.
pub fn object_key(owner_id: UserId, entry_id: EntryId) -> String {
    format!("{owner_id}/{entry_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        let owner = UserId::new();
        let entry = EntryId::new();
        assert_eq!(object_key(owner, entry), format!("{}/{}", owner.0, entry.0));
    }
}
