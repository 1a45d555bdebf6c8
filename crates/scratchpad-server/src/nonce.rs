//! Anti-forgery nonces for save requests.
//!
//! A nonce is bound to a user and an action and is derived from a server
//! secret and the current time tick. A tick lasts half the nonce lifetime and
//! the previous tick is still accepted, so a nonce stays valid for between
//! half and the full lifetime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scratchpad_core::{Clock, ResourceKey};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const NONCE_LEN: usize = 20;

pub const DEFAULT_NONCE_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub struct NonceIssuer {
    secret: String,
    tick_secs: i64,
    clock: Arc<dyn Clock>,
}

impl NonceIssuer {
    pub fn new(secret: impl Into<String>, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            tick_secs: (lifetime.as_secs() / 2).max(1) as i64,
            clock,
        }
    }

    /// Action name for saving a resource.
    pub fn save_action(key: &ResourceKey) -> String {
        format!("save:{}", key)
    }

    fn tick(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(self.tick_secs) + 1
    }

    fn compute(&self, tick: i64, user_id: &str, action: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tick.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        hasher.update(b"|");
        hasher.update(user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.secret.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(NONCE_LEN);
        digest
    }

    /// Issue a nonce for `user_id` performing `action`.
    pub fn issue(&self, user_id: &str, action: &str) -> String {
        self.compute(self.tick(self.clock.now()), user_id, action)
    }

    /// Check a nonce from the current or the previous tick.
    pub fn verify(&self, nonce: &str, user_id: &str, action: &str) -> bool {
        if nonce.len() != NONCE_LEN {
            return false;
        }
        let tick = self.tick(self.clock.now());
        [tick, tick - 1]
            .iter()
            .any(|t| self.compute(*t, user_id, action) == nonce)
    }
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("tick_secs", &self.tick_secs)
            .finish_non_exhaustive()
    }
}
