use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use scratchpad_core::heartbeat::Fields;
use scratchpad_core::ResourceKey;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::controller::LockController;
use crate::error::ClientError;
use crate::transport::Transport;

/// One heartbeat covering `controllers`.
///
/// On a transport error no controller is touched, so the editors keep
/// their last known state until a later poll succeeds.
pub(crate) async fn run_tick(
    transport: &dyn Transport,
    controllers: &[&LockController],
) -> Result<(), ClientError> {
    let mut fields = Fields::new();
    for controller in controllers {
        controller.poll_entry().write(&mut fields);
    }

    let reply = transport.heartbeat(fields).await?;
    for controller in controllers {
        controller.apply_reply(&reply);
    }
    Ok(())
}

/// Run `tick` now and then every `period` until it returns false.
///
/// A slow round trip delays the following tick instead of bunching ticks up.
pub(crate) fn spawn_poll_loop<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !tick().await {
                debug!("Poll owner dropped, stopping");
                break;
            }
        }
    })
}

/// Several guarded resources sharing one heartbeat per tick.
pub struct PollGroup {
    transport: Arc<dyn Transport>,
    controllers: Vec<Arc<LockController>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollGroup {
    pub fn new(transport: Arc<dyn Transport>, keys: impl IntoIterator<Item = ResourceKey>) -> Self {
        let controllers = keys
            .into_iter()
            .map(|key| Arc::new(LockController::new(key, transport.clone())))
            .collect();
        Self {
            transport,
            controllers,
            handle: Mutex::new(None),
        }
    }

    pub fn controllers(&self) -> &[Arc<LockController>] {
        &self.controllers
    }

    pub fn controller(&self, key: &str) -> Option<&Arc<LockController>> {
        self.controllers.iter().find(|c| c.key().as_str() == key)
    }

    /// One combined heartbeat for every resource in the group.
    pub async fn tick(&self) -> Result<(), ClientError> {
        let controllers: Vec<&LockController> =
            self.controllers.iter().map(|c| c.as_ref()).collect();
        run_tick(self.transport.as_ref(), &controllers).await
    }

    pub fn start(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let handle = spawn_poll_loop(interval, move || {
            let weak = weak.clone();
            async move {
                let Some(group) = weak.upgrade() else {
                    return false;
                };
                if let Err(e) = group.tick().await {
                    warn!("Heartbeat failed: {}", e);
                }
                true
            }
        });
        if let Some(previous) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for PollGroup {
    fn drop(&mut self) {
        self.stop();
    }
}
