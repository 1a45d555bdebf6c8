use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::resource::ResourceKey;

/// Persisted text of a guarded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedResource {
    pub key: ResourceKey,
    /// Sanitized document text.
    pub content: String,
    /// When the content was last committed.
    pub modified_at: DateTime<Utc>,
    /// Who committed it (for display only).
    #[serde(default)]
    pub modified_by: Option<String>,
}

/// Durable key -> document storage.
///
/// Only the save service writes through this trait. `store` must replace the
/// whole document atomically: concurrent readers see the old or the new
/// content, never a mix.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Returns the backend identifier (e.g., "memory", "file").
    fn backend_name(&self) -> &'static str;

    /// Load a document. `None` means it was never saved.
    async fn load(&self, key: &ResourceKey) -> Result<Option<SharedResource>, StorageError>;

    /// Replace a document, creating it on first save.
    async fn store(&self, resource: &SharedResource) -> Result<(), StorageError>;
}
