//! Bearer-token identity provider.
//!
//! Users are listed in a JSON file with the SHA-256 of their access token, so
//! the file never holds usable credentials:
//!
//! ```json
//! [{ "id": "alice", "display_name": "Alice", "token_sha256": "9f86d0..." }]
//! ```

use std::collections::HashMap;
use std::path::Path;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use scratchpad_core::DirectoryLookup;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// A user as listed in the users file.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub display_name: String,
    pub token_sha256: String,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
}

/// Token -> identity lookup, also used to resolve lock holder names.
#[derive(Debug, Default)]
pub struct UserDirectory {
    by_token_hash: HashMap<String, Identity>,
    by_id: HashMap<String, Identity>,
}

impl UserDirectory {
    pub fn from_entries(entries: impl IntoIterator<Item = UserEntry>) -> Self {
        let mut directory = Self::default();
        for entry in entries {
            let identity = Identity {
                id: entry.id,
                display_name: entry.display_name,
            };
            directory
                .by_token_hash
                .insert(entry.token_sha256.to_ascii_lowercase(), identity.clone());
            directory.by_id.insert(identity.id.clone(), identity);
        }
        directory
    }

    /// Load the users file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read users file {}: {}", path.display(), e)
        })?;
        let entries: Vec<UserEntry> = serde_json::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Failed to parse users file {}: {}", path.display(), e)
        })?;
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Resolve a bearer token.
    pub fn authenticate(&self, token: &str) -> Result<Identity, ApiError> {
        self.by_token_hash
            .get(&hash_token(token))
            .cloned()
            .ok_or(ApiError::InvalidToken)
    }
}

impl DirectoryLookup for UserDirectory {
    fn display_name(&self, user_id: &str) -> Option<String> {
        self.by_id.get(user_id).map(|i| i.display_name.clone())
    }
}

/// Hash a token using SHA-256.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract Bearer token from Authorization header.
fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let identity = state.directory.authenticate(token)?;
        debug!("Authenticated request for {}", identity.id);
        Ok(Caller(identity))
    }
}
