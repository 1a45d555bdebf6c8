use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scratchpad_core::{ContentStore, ResourceKey, SharedResource, StorageError};
use tokio::fs;
use tracing::{debug, instrument};

/// Local filesystem content store.
///
/// One JSON document per resource:
/// ```text
/// {base_dir}/
///   resources/
///     {key}.json
/// ```
/// Writes go to a uniquely named temp file that is renamed over the target,
/// so readers observe either the previous or the new document.
#[derive(Debug, Clone)]
pub struct FileContentStore {
    base_dir: PathBuf,
}

impl FileContentStore {
    /// Create a new FileContentStore with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn resources_dir(&self) -> PathBuf {
        self.base_dir.join("resources")
    }

    /// Get the path to a resource file.
    fn resource_path(&self, key: &ResourceKey) -> PathBuf {
        self.resources_dir().join(format!("{}.json", key))
    }

    /// Ensure the resources directory exists.
    ///
    /// A data directory that cannot be created means the store itself is
    /// unreachable, not that one document failed.
    async fn ensure_resources_dir(&self) -> Result<(), StorageError> {
        let dir = self.resources_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::Unavailable(format!(
                "Cannot create resources dir {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self), level = "debug")]
    async fn load(&self, key: &ResourceKey) -> Result<Option<SharedResource>, StorageError> {
        let path = self.resource_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Resource {} not saved yet", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let document: SharedResource = serde_json::from_slice(&raw).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        debug!("Loaded {} ({} bytes)", key, document.content.len());
        Ok(Some(document))
    }

    #[instrument(skip(self, resource), level = "debug", fields(key = %resource.key))]
    async fn store(&self, resource: &SharedResource) -> Result<(), StorageError> {
        self.ensure_resources_dir().await?;

        let path = self.resource_path(&resource.key);
        let tmp_path = self
            .resources_dir()
            .join(format!(".{}.{}.tmp", resource.key, uuid::Uuid::new_v4()));

        let json = serde_json::to_vec_pretty(resource).map_err(|e| {
            StorageError::Serialization(format!("Failed to serialize {}: {}", resource.key, e))
        })?;

        fs::write(&tmp_path, &json).await.map_err(|e| {
            StorageError::Io(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }

        debug!("Stored {} ({} bytes)", resource.key, json.len());
        Ok(())
    }
}
