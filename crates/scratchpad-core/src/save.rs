use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::content::{ContentStore, SharedResource};
use crate::error::StorageError;
use crate::lock::{read_live, LockStore};
use crate::resource::ResourceKey;
use crate::sanitize::ContentSanitizer;

/// Largest document accepted by a save, before sanitizing.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 256 * 1024;

/// Why a save was not committed.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("{reason}")]
    Rejected { reason: String },

    #[error("content is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Acknowledgement of a committed save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveAck {
    pub key: ResourceKey,
    /// Size of the stored (sanitized) content.
    pub bytes: usize,
    pub saved_at: DateTime<Utc>,
}

/// Commits new document content, gated by a fresh lock check.
///
/// The check never trusts an earlier poll verdict: it re-reads the lock record
/// at save time, which is what rejects a stale holder whose lock was taken over
/// between its last poll and its save.
pub struct SaveService {
    locks: Arc<dyn LockStore>,
    content: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    sanitizer: ContentSanitizer,
    ttl: Duration,
    max_content_bytes: usize,
}

impl SaveService {
    pub fn new(
        locks: Arc<dyn LockStore>,
        content: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            locks,
            content,
            clock,
            sanitizer: ContentSanitizer::new(),
            ttl,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }

    pub fn with_max_content_bytes(mut self, limit: usize) -> Self {
        self.max_content_bytes = limit;
        self
    }

    /// Save `new_content` for `key` on behalf of `caller_id`.
    ///
    /// Rejected when a live lock is held by someone else. Does not create or
    /// renew the lock.
    #[instrument(skip(self, new_content), level = "debug", fields(content_len = new_content.len()))]
    pub async fn save(
        &self,
        key: &ResourceKey,
        caller_id: &str,
        new_content: &str,
    ) -> Result<SaveAck, SaveError> {
        if new_content.len() > self.max_content_bytes {
            return Err(SaveError::TooLarge {
                size: new_content.len(),
                limit: self.max_content_bytes,
            });
        }

        let now = self.clock.now();
        if let Some(holder) = read_live(self.locks.as_ref(), key, now, self.ttl).await? {
            if holder.holder_id != caller_id {
                debug!(
                    "Save on {} by {} rejected: locked by {}",
                    key, caller_id, holder.holder_id
                );
                return Err(SaveError::Rejected {
                    reason: "locked by other".to_string(),
                });
            }
        }

        let content = self.sanitizer.sanitize(new_content);
        let document = SharedResource {
            key: key.clone(),
            content,
            modified_at: now,
            modified_by: Some(caller_id.to_string()),
        };
        self.content.store(&document).await?;

        info!("Saved {} ({} bytes) for {}", key, document.content.len(), caller_id);
        Ok(SaveAck {
            key: key.clone(),
            bytes: document.content.len(),
            saved_at: now,
        })
    }

    /// Current document text; empty if never saved.
    pub async fn load(&self, key: &ResourceKey) -> Result<Option<SharedResource>, StorageError> {
        self.content.load(key).await
    }
}
