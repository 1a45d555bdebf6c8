use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::clock::Clock;
use crate::content::ContentStore;
use crate::error::StorageError;
use crate::lock::{read_live, LockRecord, LockStore, LockVerdict};
use crate::resource::ResourceKey;

/// How many times a lost compare-and-swap is retried before giving up.
const MAX_SWAP_ATTEMPTS: usize = 8;

/// Resolves a holder id to something a human recognizes.
pub trait DirectoryLookup: Send + Sync {
    /// Display name for a user id, if known.
    fn display_name(&self, user_id: &str) -> Option<String>;
}

/// Decides, once per resource per poll, whether the caller holds the lock.
///
/// One manager serves every guarded resource; the resource key is a parameter
/// of each call.
pub struct LockManager {
    locks: Arc<dyn LockStore>,
    content: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn DirectoryLookup>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(
        locks: Arc<dyn LockStore>,
        content: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn DirectoryLookup>,
        ttl: Duration,
    ) -> Self {
        Self {
            locks,
            content,
            clock,
            directory,
            ttl,
        }
    }

    /// Evaluate one poll from `caller_id`.
    ///
    /// - Live lock held by someone else: `Locked`, nothing written.
    /// - Otherwise, if the caller is editing: the lock is written or renewed, `Owned`.
    /// - Otherwise: `Free`. A lock the caller still holds is left to expire.
    #[instrument(skip(self), level = "debug")]
    pub async fn evaluate(
        &self,
        key: &ResourceKey,
        caller_id: &str,
        is_editing: bool,
    ) -> Result<LockVerdict, StorageError> {
        for attempt in 0..MAX_SWAP_ATTEMPTS {
            let now = self.clock.now();
            let stored = self.locks.get(key).await?;

            if let Some(holder) = stored
                .as_ref()
                .filter(|r| r.is_live(now, self.ttl) && r.holder_id != caller_id)
            {
                return self.locked_verdict(key, holder).await;
            }

            if !is_editing {
                return Ok(LockVerdict::Free);
            }

            let renewed = LockRecord::new(caller_id, now);
            if self
                .locks
                .compare_and_swap(key, stored.as_ref(), renewed)
                .await?
            {
                debug!("Lock on {} owned by {} (attempt {})", key, caller_id, attempt);
                return Ok(LockVerdict::Owned);
            }
        }

        warn!(
            "Lock on {} still contended after {} attempts (caller {})",
            key, MAX_SWAP_ATTEMPTS, caller_id
        );
        Err(StorageError::Lock(format!(
            "lock on {} is contended, try again",
            key
        )))
    }

    /// The current live holder of `key`, if any.
    pub async fn current_holder(&self, key: &ResourceKey) -> Result<Option<LockRecord>, StorageError> {
        read_live(self.locks.as_ref(), key, self.clock.now(), self.ttl).await
    }

    async fn locked_verdict(
        &self,
        key: &ResourceKey,
        holder: &LockRecord,
    ) -> Result<LockVerdict, StorageError> {
        let content = self
            .content
            .load(key)
            .await?
            .map(|doc| doc.content)
            .unwrap_or_default();
        let owner_name = self
            .directory
            .display_name(&holder.holder_id)
            .unwrap_or_else(|| holder.holder_id.clone());

        debug!("Lock on {} held by {}", key, holder.holder_id);
        Ok(LockVerdict::Locked {
            owner_id: holder.holder_id.clone(),
            owner_name,
            content,
        })
    }
}
