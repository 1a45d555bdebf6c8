use std::sync::Arc;

use scratchpad_core::{LockManager, ResourceKey, SaveService};

use crate::auth::UserDirectory;
use crate::error::ApiError;
use crate::nonce::NonceIssuer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<UserDirectory>,
    pub nonces: Arc<NonceIssuer>,
    pub manager: Arc<LockManager>,
    pub saver: Arc<SaveService>,
    /// Guarded resources, in heartbeat order.
    pub resources: Arc<Vec<ResourceKey>>,
}

impl AppState {
    /// Resolve a path segment to a configured resource.
    pub fn resource(&self, key: &str) -> Result<ResourceKey, ApiError> {
        self.resources
            .iter()
            .find(|r| r.as_str() == key)
            .cloned()
            .ok_or_else(|| ApiError::UnknownResource(key.to_string()))
    }
}
