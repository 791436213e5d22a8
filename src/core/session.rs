//! Connected-session lifetime: the outbound write loop and guaranteed teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::entity_map::EntityMap;
use crate::core::bluetooth::PeripheralLink;
use crate::core::frame::{BinaryFrame, SensorSnapshot};
use crate::error::{BridgeError, Result};
use crate::hass::Backend;

/// Fetches the backend state and packs it into a frame.
pub async fn poll_frame(backend: &dyn Backend, entity_map: &EntityMap) -> Result<BinaryFrame> {
    let states: HashMap<String, String> = backend.fetch_states().await?;
    let snapshot = SensorSnapshot::build(&entity_map.project(&states))?;
    debug!("Sending: {:?}", snapshot);
    Ok(snapshot.encode())
}

/// Pushes a fresh frame every `interval` until a step fails or `cancel` fires.
///
/// Returns the number of frames sent when stopped. Any error ends the loop
/// without retrying; the caller tears the session down.
pub async fn run_write_loop<L>(
    link: &L,
    backend: &dyn Backend,
    entity_map: &EntityMap,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<u64>
where
    L: PeripheralLink + ?Sized,
{
    let mut frames_sent = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Ok(frames_sent);
        }
        if !link.is_connected().await {
            return Err(BridgeError::BleLink("peripheral is no longer connected".to_string()));
        }

        let frame = poll_frame(backend, entity_map).await?;
        link.write_frame(frame.as_bytes()).await?;
        frames_sent += 1;
        info!("Sent.");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Ok(frames_sent),
        }
    }
}

/// Owns a connected link and the tasks bound to it.
///
/// [`SessionGuard::release`] disconnects exactly once. If the guard is dropped
/// without being released (the owning future was cancelled mid-write), the
/// tasks are aborted and the disconnect is spawned onto the runtime.
pub struct SessionGuard<L: PeripheralLink + 'static> {
    link: Arc<L>,
    tasks: Vec<JoinHandle<()>>,
    released: bool,
}

impl<L: PeripheralLink + 'static> SessionGuard<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Arc::new(link),
            tasks: Vec::new(),
            released: false,
        }
    }

    pub fn link(&self) -> Arc<L> {
        self.link.clone()
    }

    /// Binds a task to the session; it is aborted on teardown.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub async fn release(mut self) {
        self.released = true;
        self.abort_tasks();
        if let Err(e) = self.link.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl<L: PeripheralLink + 'static> Drop for SessionGuard<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.abort_tasks();

        let link = self.link.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = link.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                });
            }
            Err(_) => error!("Session dropped outside the runtime; link left open"),
        }
    }
}
