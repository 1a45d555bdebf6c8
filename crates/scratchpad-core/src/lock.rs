use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::resource::ResourceKey;

/// Lifetime of an unrenewed lock. Expiry is the only release mechanism.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// The single lock record a resource may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identity of the client currently holding the lock.
    pub holder_id: String,
    /// When the lock was last renewed.
    pub acquired_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn new(holder_id: impl Into<String>, acquired_at: DateTime<Utc>) -> Self {
        Self {
            holder_id: holder_id.into(),
            acquired_at,
        }
    }

    /// A record is live up to and including `acquired_at + ttl`; only a record
    /// older than the TTL counts as absent.
    pub fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.expires_at(ttl) {
            Some(expires_at) => now <= expires_at,
            None => true,
        }
    }

    pub fn expires_at(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.acquired_at.checked_add_signed(ttl))
    }
}

/// Outcome of a lock evaluation for one caller on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockVerdict {
    /// Someone else holds a live lock. Carries what the locked-out client needs
    /// to mirror the authoritative document.
    Locked {
        owner_id: String,
        owner_name: String,
        content: String,
    },
    /// The caller holds (and just renewed) the lock.
    Owned,
    /// Nobody else holds the lock and the caller is not editing.
    Free,
}

impl LockVerdict {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockVerdict::Locked { .. })
    }
}

/// Keyed storage for lock records.
///
/// Implementations only store and swap records; TTL interpretation happens in
/// the lock manager, so a store may return records that are already stale.
/// `compare_and_swap` must be atomic per key: two concurrent swaps expecting
/// the same current value cannot both succeed.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Returns the backend identifier (e.g., "memory").
    fn backend_name(&self) -> &'static str;

    /// Read the current record for a resource, live or not.
    async fn get(&self, key: &ResourceKey) -> Result<Option<LockRecord>, StorageError>;

    /// Replace the record for `key` with `new` if the stored value still equals
    /// `expected` (`None` meaning "no record").
    ///
    /// # Returns
    /// * `Ok(true)` - the swap happened
    /// * `Ok(false)` - the stored value changed since it was read
    async fn compare_and_swap(
        &self,
        key: &ResourceKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StorageError>;
}

/// Read the record for `key` and drop it if it has expired.
pub(crate) async fn read_live(
    store: &dyn LockStore,
    key: &ResourceKey,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<Option<LockRecord>, StorageError> {
    Ok(store.get(key).await?.filter(|r| r.is_live(now, ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_liveness_boundary() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let record = LockRecord::new("alice", t0);
        let ttl = Duration::from_secs(30);

        assert!(record.is_live(t0, ttl));
        assert!(record.is_live(t0 + chrono::Duration::milliseconds(29_999), ttl));
        // Aged exactly the TTL is not yet older than it
        assert!(record.is_live(t0 + chrono::Duration::seconds(30), ttl));
        assert!(!record.is_live(t0 + chrono::Duration::milliseconds(30_001), ttl));
        assert!(!record.is_live(t0 + chrono::Duration::seconds(31), ttl));
        assert_eq!(
            record.expires_at(ttl),
            Some(t0 + chrono::Duration::seconds(30))
        );
    }
}
