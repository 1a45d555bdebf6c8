use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scratchpad_core::heartbeat::{read_status, Fields, LockStatus, PollEntry, SaveRequest};
use scratchpad_core::ResourceKey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::idle::IdleTimer;
use crate::poller::{run_tick, spawn_poll_loop};
use crate::transport::Transport;

/// Input-free time after which the user no longer counts as editing.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Heartbeat period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Lock state as seen by the local editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// Editor is interactive.
    Unlocked,
    /// Someone else holds the lock; editor is read-only and mirrors the server.
    LockedOut { owner: String },
}

/// Transient message shown next to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved,
    Error(String),
}

/// Everything a UI needs to render one guarded editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorView {
    pub state: ControllerState,
    pub buffer: String,
    pub notice: Option<Notice>,
}

impl EditorView {
    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ControllerState::LockedOut { .. })
    }
}

/// Result of a user-triggered save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The server refused the save (someone else holds the lock).
    Rejected(String),
    /// The request did not go through; nothing changed locally.
    Failed(String),
}

struct Inner {
    buffer: String,
    idle: IdleTimer,
    state: ControllerState,
    nonce: Option<String>,
    notice: Option<Notice>,
}

impl Inner {
    fn view(&self) -> EditorView {
        EditorView {
            state: self.state.clone(),
            buffer: self.buffer.clone(),
            notice: self.notice.clone(),
        }
    }
}

/// Client lock controller for one guarded resource.
///
/// Starts optimistically `Unlocked`, before the first poll has answered.
pub struct LockController {
    key: ResourceKey,
    transport: Arc<dyn Transport>,
    inner: Mutex<Inner>,
    view: watch::Sender<EditorView>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl LockController {
    pub fn new(key: ResourceKey, transport: Arc<dyn Transport>) -> Self {
        Self::with_idle_timeout(key, transport, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        key: ResourceKey,
        transport: Arc<dyn Transport>,
        idle_timeout: Duration,
    ) -> Self {
        let inner = Inner {
            buffer: String::new(),
            idle: IdleTimer::new(idle_timeout),
            state: ControllerState::Unlocked,
            nonce: None,
            notice: None,
        };
        let (view, _) = watch::channel(inner.view());
        Self {
            key,
            transport,
            inner: Mutex::new(inner),
            view,
            poller: Mutex::new(None),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.view.send_if_modified(|current| {
            let next = inner.view();
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn state(&self) -> ControllerState {
        self.inner().state.clone()
    }

    pub fn buffer(&self) -> String {
        self.inner().buffer.clone()
    }

    /// Watch the editor view; a new value is published on every change.
    pub fn subscribe(&self) -> watch::Receiver<EditorView> {
        self.view.subscribe()
    }

    /// Whether the local user typed within the idle timeout.
    pub fn is_editing(&self) -> bool {
        self.inner().idle.is_active()
    }

    /// Fetch the current document into the buffer, unless the user already
    /// started typing.
    pub async fn load(&self) -> Result<(), ClientError> {
        let document = self.transport.load(&self.key).await?;
        let mut inner = self.inner();
        if !inner.idle.is_active() {
            inner.buffer = document.content;
            self.publish(&inner);
        }
        Ok(())
    }

    /// Local input. Ignored while locked out, since the editor is read-only then.
    ///
    /// Returns whether the input was accepted.
    pub fn on_input(&self, text: impl Into<String>) -> bool {
        let mut inner = self.inner();
        if let ControllerState::LockedOut { owner } = &inner.state {
            debug!("Input on {} ignored, locked by {}", self.key, owner);
            return false;
        }
        inner.buffer = text.into();
        inner.idle.touch();
        inner.notice = None;
        self.publish(&inner);
        true
    }

    /// This controller's share of the next heartbeat.
    pub fn poll_entry(&self) -> PollEntry {
        PollEntry {
            key: self.key.clone(),
            is_editing: self.is_editing(),
        }
    }

    /// Apply the server's verdict from a heartbeat reply.
    ///
    /// `owned` and `free` unlock the editor. `locked` disables it and, if the
    /// server copy differs, replaces the local buffer with it; unsaved local
    /// text is discarded, since this user is not the editor. A "saved"
    /// confirmation lasts until the next answered poll.
    pub fn apply_reply(&self, reply: &Fields) {
        let Some(status) = read_status(reply, &self.key) else {
            debug!("Heartbeat reply has no status for {}", self.key);
            return;
        };

        let mut inner = self.inner();
        if inner.notice == Some(Notice::Saved) {
            inner.notice = None;
        }
        match status {
            LockStatus::Owned | LockStatus::Free => {
                if inner.state != ControllerState::Unlocked {
                    info!("{} unlocked", self.key);
                    inner.state = ControllerState::Unlocked;
                }
            }
            LockStatus::Locked { owner, content } => {
                let locked = ControllerState::LockedOut { owner };
                if inner.state != locked {
                    info!("{} locked: {:?}", self.key, locked);
                    inner.state = locked;
                }
                if inner.buffer != content {
                    debug!("Replacing local {} with server content", self.key);
                    inner.buffer = content;
                }
            }
        }
        self.publish(&inner);
    }

    /// One heartbeat for this resource alone.
    pub async fn poll_once(&self) -> Result<(), ClientError> {
        run_tick(self.transport.as_ref(), &[self]).await
    }

    /// Start the owned polling task. The first poll runs immediately.
    /// Restarting replaces the previous task.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let handle = spawn_poll_loop(interval, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(controller) => {
                        if let Err(e) = controller.poll_once().await {
                            warn!("Heartbeat for {} failed: {}", controller.key, e);
                        }
                        true
                    }
                    None => false,
                }
            }
        });
        if let Some(previous) = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    /// Stop the polling task, if running.
    pub fn stop(&self) {
        if let Some(handle) = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
            debug!("Stopped polling {}", self.key);
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Send the buffer to the server.
    ///
    /// A rejection keeps the buffer; the user can copy it out before the next
    /// locked poll overwrites it.
    pub async fn save(&self) -> SaveOutcome {
        let outcome = self.try_save().await;
        let mut inner = self.inner();
        inner.notice = Some(match &outcome {
            SaveOutcome::Saved => Notice::Saved,
            SaveOutcome::Rejected(msg) | SaveOutcome::Failed(msg) => Notice::Error(msg.clone()),
        });
        self.publish(&inner);
        outcome
    }

    /// A cached nonce the server no longer accepts (it outlived its lifetime)
    /// is dropped and the save retried once with a fresh one.
    async fn try_save(&self) -> SaveOutcome {
        let content = self.buffer();
        loop {
            let (nonce, cached) = match self.nonce().await {
                Ok(nonce) => nonce,
                Err(e) => {
                    warn!("Could not get a save nonce for {}: {}", self.key, e);
                    return SaveOutcome::Failed("request failed".to_string());
                }
            };

            let request = SaveRequest {
                nonce,
                content: content.clone(),
            };
            match self.transport.save(&self.key, &request).await {
                Ok(response) if response.success => {
                    debug!("Saved {}", self.key);
                    return SaveOutcome::Saved;
                }
                Ok(response) => {
                    let message = response
                        .message
                        .unwrap_or_else(|| "locked by other".to_string());
                    info!("Save of {} rejected: {}", self.key, message);
                    return SaveOutcome::Rejected(message);
                }
                Err(e) if e.is_fatal() => {
                    self.inner().nonce = None;
                    if cached && matches!(e, ClientError::Status { status: 403, .. }) {
                        debug!("Cached nonce for {} expired, fetching a fresh one", self.key);
                        continue;
                    }
                    warn!("Save of {} failed: {}", self.key, e);
                    return SaveOutcome::Failed(e.to_string());
                }
                Err(e) => {
                    warn!("Save of {} failed: {}", self.key, e);
                    return SaveOutcome::Failed("request failed".to_string());
                }
            }
        }
    }

    /// The save nonce, and whether it came from the cache.
    async fn nonce(&self) -> Result<(String, bool), ClientError> {
        let cached = self.inner().nonce.clone();
        if let Some(nonce) = cached {
            return Ok((nonce, true));
        }
        let nonce = self.transport.nonce(&self.key).await?;
        self.inner().nonce = Some(nonce.clone());
        Ok((nonce, false))
    }
}

impl Drop for LockController {
    fn drop(&mut self) {
        self.stop();
    }
}
