//! Outer reconnect loop.

use std::time::Duration;

use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::IDLE_POLL_INTERVAL;
use crate::core::bluetooth::{ConnectionManager, ConnectionState, CycleOutcome, Radio};

/// Drives the connection manager through discovery/session/teardown cycles
/// until stopped.
pub struct Supervisor<R: Radio> {
    manager: ConnectionManager<R>,
    idle_poll_interval: Duration,
}

impl<R: Radio> Supervisor<R> {
    pub fn new(manager: ConnectionManager<R>) -> Self {
        Self {
            manager,
            idle_poll_interval: IDLE_POLL_INTERVAL,
        }
    }

    pub fn with_idle_poll_interval(mut self, idle_poll_interval: Duration) -> Self {
        self.idle_poll_interval = idle_poll_interval;
        self
    }

    pub fn manager(&self) -> &ConnectionManager<R> {
        &self.manager
    }

    /// Runs cycles until `cancel` fires. Returns the number of cycles started.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        let mut cycles = 0u64;
        let mut state = self.manager.subscribe_state();

        while !cancel.is_cancelled() {
            cycles += 1;
            info!("Starting discovery cycle {}", cycles);

            match self.manager.run_cycle(&cancel).await {
                Ok(CycleOutcome::Cancelled) => break,
                Ok(CycleOutcome::SessionStopped { frames_sent }) => {
                    info!("Session ended after {} frames", frames_sent);
                }
                Ok(CycleOutcome::SessionFailed(e)) => error!("Session failed: {}", e),
                Ok(CycleOutcome::ConnectFailed(e)) => error!("Connect failed: {}", e),
                Ok(CycleOutcome::Suppressed) => {}
                Err(e) => error!("Discovery failed: {}", e),
            }

            if *state.borrow_and_update() == ConnectionState::Connected {
                error!("Cycle ended while still marked connected");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.idle_poll_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("Supervisor stopped after {} cycles", cycles);
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::testing::{MockBackend, MockRadio, sample_entity_map, sample_states};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_tears_down_once_and_rescans() {
        let stop = CancellationToken::new();
        let mut radio = MockRadio::new(1, stop.clone());
        radio.fail_on_write = Some(4);
        let radio = Arc::new(radio);
        let backend = Arc::new(MockBackend::with_states(sample_states()));

        let manager = ConnectionManager::new(
            radio.clone(),
            "80:E1:26:1D:3D:92",
            backend.clone(),
            Arc::new(sample_entity_map()),
        );
        let supervisor = Supervisor::new(manager);

        let started = tokio::time::Instant::now();
        let cycles = supervisor.run(stop.clone()).await;

        // Three good frames at 5 s spacing, the fourth write fails.
        assert_eq!(radio.link_count(), 1);
        let link = radio.link(0);
        assert_eq!(link.write_count(), 4);
        assert_eq!(link.disconnect_count(), 1);
        assert!(started.elapsed() >= Duration::from_secs(15));

        // Discovery was entered again after teardown.
        assert_eq!(radio.discovery_count(), 2);
        assert_eq!(cycles, 2);
        assert_eq!(supervisor.manager().state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_connect_failures() {
        let stop = CancellationToken::new();
        let radio = Arc::new(MockRadio::new(3, stop.clone()));
        radio.connect_failures.store(2, std::sync::atomic::Ordering::SeqCst);
        let backend = Arc::new(MockBackend::with_states(sample_states()));
        backend.set_fetch_error(BridgeError::RemoteUnavailable("down".into()));

        let manager =
            ConnectionManager::new(radio.clone(), "80:E1:26:1D:3D:92", backend, Arc::new(sample_entity_map()));
        let started = tokio::time::Instant::now();
        let cycles = Supervisor::new(manager)
            .with_idle_poll_interval(Duration::from_secs(1))
            .run(stop)
            .await;

        assert_eq!(cycles, 4);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(radio.link_count(), 1);
        assert_eq!(radio.link(0).disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_stops_immediately_when_already_cancelled() {
        let stop = CancellationToken::new();
        stop.cancel();
        let radio = Arc::new(MockRadio::new(0, stop.clone()));
        let manager = ConnectionManager::new(
            radio.clone(),
            "80:E1:26:1D:3D:92",
            Arc::new(MockBackend::default()),
            Arc::new(sample_entity_map()),
        );

        assert_eq!(Supervisor::new(manager).run(stop).await, 0);
        assert_eq!(radio.discovery_count(), 0);
    }
}
