//! In-memory object storage that records what the drive asked of it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::{ObjectStorage, PresignedRequest};

/// Object storage stand-in for tests and local runs.
///
/// Presigned URLs use the `memory://` scheme and are never served.
#[derive(Debug, Clone)]
pub struct MemoryObjectStorage {
    expiry_seconds: u64,
    tags: Arc<Mutex<HashMap<String, BTreeMap<String, String>>>>,
    fail_tagging: Arc<AtomicBool>,
}

impl MemoryObjectStorage {
    /// Create a recorder whose URLs expire after `expiry_seconds`.
    pub fn new(expiry_seconds: u64) -> Self {
        Self {
            expiry_seconds,
            tags: Arc::new(Mutex::new(HashMap::new())),
            fail_tagging: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current value of `tag` on the object at `key`.
    pub async fn tag(&self, key: &str, tag: &str) -> Option<String> {
        self.tags
            .lock()
            .await
            .get(key)
            .and_then(|tags| tags.get(tag).cloned())
    }

    /// Make every following `tag_object` call fail.
    pub fn fail_tagging(&self, fail: bool) {
        self.fail_tagging.store(fail, Ordering::SeqCst);
    }

    fn presign(&self, method: &str, key: &str, headers: BTreeMap<String, String>) -> PresignedRequest {
        let expires_at = Utc::now() + chrono::Duration::seconds(self.expiry_seconds as i64);
        PresignedRequest {
            url: format!("memory://{key}?expires={}", expires_at.timestamp()),
            method: method.to_string(),
            headers,
            expires_at,
        }
    }
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new(1800)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn presign_upload(&self, key: &str, size: i64) -> AppResult<PresignedRequest> {
        if size < 0 {
            return Err(AppError::validation(format!("Negative upload size for {key}")));
        }
        let headers = BTreeMap::from([("content-length".to_string(), size.to_string())]);
        Ok(self.presign("PUT", key, headers))
    }

    async fn presign_download(&self, key: &str) -> AppResult<PresignedRequest> {
        Ok(self.presign("GET", key, BTreeMap::new()))
    }

    async fn tag_object(&self, key: &str, tag: &str, value: &str) -> AppResult<()> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(AppError::object_storage(format!("Failed to tag object {key}")));
        }
        // Tagging replaces the whole tag set.
        self.tags.lock().await.insert(
            key.to_string(),
            BTreeMap::from([(tag.to_string(), value.to_string())]),
        );
        Ok(())
    }
}
