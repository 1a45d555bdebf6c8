use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::content::{ContentStore, SharedResource};
use crate::error::StorageError;
use crate::lock::{LockRecord, LockStore};
use crate::resource::ResourceKey;

/// Process-local lock store.
///
/// The swap runs under the DashMap shard guard for the key, which gives the
/// single-writer-per-key guarantee the lock manager relies on. Records are
/// never swept; a stale record is simply overwritten by the next acquirer.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: DashMap<ResourceKey, LockRecord>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<LockRecord>, StorageError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    #[instrument(skip(self, expected), level = "debug")]
    async fn compare_and_swap(
        &self,
        key: &ResourceKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StorageError> {
        match self.records.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if expected != Some(entry.get()) {
                    debug!(
                        "Lock swap on {} lost: stored holder {} changed",
                        key,
                        entry.get().holder_id
                    );
                    return Ok(false);
                }
                entry.insert(new);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    debug!("Lock swap on {} lost: record vanished", key);
                    return Ok(false);
                }
                entry.insert(new);
                Ok(true)
            }
        }
    }
}

/// Process-local content store, used in tests and for ephemeral servers.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    documents: DashMap<ResourceKey, SharedResource>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &ResourceKey) -> Result<Option<SharedResource>, StorageError> {
        Ok(self.documents.get(key).map(|d| d.value().clone()))
    }

    async fn store(&self, resource: &SharedResource) -> Result<(), StorageError> {
        self.documents
            .insert(resource.key.clone(), resource.clone());
        Ok(())
    }
}
