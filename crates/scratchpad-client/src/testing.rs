//! In-process server stand-in for controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scratchpad_core::heartbeat::{
    read_request, write_status, Fields, LockStatus, ResourceResponse, SaveRequest, SaveResponse,
};
use scratchpad_core::{
    DirectoryLookup, LockManager, ManualClock, MemoryContentStore, MemoryLockStore, ResourceKey,
    SaveError, SaveService, DEFAULT_LOCK_TTL,
};

use crate::error::ClientError;
use crate::transport::Transport;

struct Names(HashMap<String, String>);

impl DirectoryLookup for Names {
    fn display_name(&self, user_id: &str) -> Option<String> {
        self.0.get(user_id).cloned()
    }
}

struct Shared {
    manager: LockManager,
    saver: SaveService,
    resources: Vec<ResourceKey>,
    offline: AtomicBool,
    heartbeats: AtomicUsize,
    nonce_generation: AtomicUsize,
    nonces_issued: AtomicUsize,
}

/// Lock manager and save service shared by any number of users.
pub(crate) struct Cluster {
    pub clock: Arc<ManualClock>,
    shared: Arc<Shared>,
}

impl Cluster {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let locks = Arc::new(MemoryLockStore::new());
        let content = Arc::new(MemoryContentStore::new());
        let names = Names(HashMap::from([
            ("alice".to_string(), "Alice".to_string()),
            ("bob".to_string(), "Bob".to_string()),
        ]));
        let manager = LockManager::new(
            locks.clone(),
            content.clone(),
            clock.clone(),
            Arc::new(names),
            DEFAULT_LOCK_TTL,
        );
        let saver = SaveService::new(locks, content, clock.clone(), DEFAULT_LOCK_TTL);
        Self {
            clock,
            shared: Arc::new(Shared {
                manager,
                saver,
                resources: vec![
                    ResourceKey::new("scratchpad").unwrap(),
                    ResourceKey::new("agenda").unwrap(),
                ],
                offline: AtomicBool::new(false),
                heartbeats: AtomicUsize::new(0),
                nonce_generation: AtomicUsize::new(0),
                nonces_issued: AtomicUsize::new(0),
            }),
        }
    }

    pub fn transport(&self, user_id: &str) -> Arc<dyn Transport> {
        Arc::new(InProcessTransport {
            user_id: user_id.to_string(),
            shared: self.shared.clone(),
        })
    }

    /// Make every request fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate every nonce issued so far, as a lifetime rollover would.
    pub fn expire_nonces(&self) {
        self.shared.nonce_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Nonces handed out so far.
    pub fn nonces_issued(&self) -> usize {
        self.shared.nonces_issued.load(Ordering::SeqCst)
    }

    /// Heartbeats answered so far.
    pub fn heartbeats(&self) -> usize {
        self.shared.heartbeats.load(Ordering::SeqCst)
    }
}

struct InProcessTransport {
    user_id: String,
    shared: Arc<Shared>,
}

impl InProcessTransport {
    fn current_nonce(&self, key: &ResourceKey) -> String {
        let generation = self.shared.nonce_generation.load(Ordering::SeqCst);
        format!("nonce-{}-{}-{}", generation, self.user_id, key)
    }

    fn check_online(&self) -> Result<(), ClientError> {
        if self.shared.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

fn internal(e: impl std::fmt::Display) -> ClientError {
    ClientError::Status {
        status: 503,
        message: e.to_string(),
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn heartbeat(&self, fields: Fields) -> Result<Fields, ClientError> {
        self.check_online()?;
        self.shared.heartbeats.fetch_add(1, Ordering::SeqCst);

        let mut reply = Fields::new();
        for entry in read_request(&fields, &self.shared.resources) {
            let verdict = self
                .shared
                .manager
                .evaluate(&entry.key, &self.user_id, entry.is_editing)
                .await
                .map_err(internal)?;
            write_status(&mut reply, &entry.key, &LockStatus::from(&verdict));
        }
        Ok(reply)
    }

    async fn load(&self, key: &ResourceKey) -> Result<ResourceResponse, ClientError> {
        self.check_online()?;
        let document = self.shared.saver.load(key).await.map_err(internal)?;
        Ok(ResourceResponse {
            key: key.clone(),
            content: document.as_ref().map(|d| d.content.clone()).unwrap_or_default(),
            modified_at: document.as_ref().map(|d| d.modified_at),
            modified_by: document.and_then(|d| d.modified_by),
        })
    }

    async fn nonce(&self, key: &ResourceKey) -> Result<String, ClientError> {
        self.check_online()?;
        self.shared.nonces_issued.fetch_add(1, Ordering::SeqCst);
        Ok(self.current_nonce(key))
    }

    async fn save(
        &self,
        key: &ResourceKey,
        request: &SaveRequest,
    ) -> Result<SaveResponse, ClientError> {
        self.check_online()?;
        if request.nonce != self.current_nonce(key) {
            return Err(ClientError::Status {
                status: 403,
                message: "Invalid nonce".to_string(),
            });
        }
        match self
            .shared
            .saver
            .save(key, &self.user_id, &request.content)
            .await
        {
            Ok(_) => Ok(SaveResponse {
                success: true,
                message: Some("Saved".to_string()),
            }),
            Err(SaveError::Rejected { reason }) => Ok(SaveResponse {
                success: false,
                message: Some(reason),
            }),
            Err(e @ SaveError::TooLarge { .. }) => Ok(SaveResponse {
                success: false,
                message: Some(e.to_string()),
            }),
            Err(SaveError::Storage(e)) => Err(internal(e)),
        }
    }
}
