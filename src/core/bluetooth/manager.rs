//! Connection manager for the display peripheral
//! This module drives one discovery -> connect -> session -> teardown cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::entity_map::EntityMap;
use crate::core::bluetooth::commands::CommandHandler;
use crate::core::bluetooth::constants::{CONNECT_TIMEOUT, WRITE_INTERVAL};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::types::{ConnectionState, PeripheralLink, Radio};
use crate::core::session::{SessionGuard, run_write_loop};
use crate::error::{BridgeError, Result};
use crate::hass::Backend;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Stop was requested before the peripheral was found.
    Cancelled,
    /// A connection attempt was already in flight.
    Suppressed,
    /// Connecting failed; no session was started.
    ConnectFailed(BridgeError),
    /// The session was stopped on request and torn down.
    SessionStopped { frames_sent: u64 },
    /// The session failed and was torn down.
    SessionFailed(BridgeError),
}

/// Owns the connection state and the peripheral session.
pub struct ConnectionManager<R: Radio> {
    radio: R,
    address: String,
    backend: Arc<dyn Backend>,
    entity_map: Arc<EntityMap>,
    notification_handler: NotificationHandler,
    connect_timeout: Duration,
    write_interval: Duration,
    /// Set when the peripheral is detected, cleared on disconnect.
    detected: AtomicBool,
    state: watch::Sender<ConnectionState>,
}

impl<R: Radio> ConnectionManager<R> {
    pub fn new(
        radio: R,
        address: impl Into<String>,
        backend: Arc<dyn Backend>,
        entity_map: Arc<EntityMap>,
    ) -> Self {
        let command_handler = CommandHandler::new(backend.clone(), entity_map.clone());
        let (state, _) = watch::channel(ConnectionState::Idle);

        Self {
            radio,
            address: address.into(),
            backend,
            entity_map,
            notification_handler: NotificationHandler::new(command_handler),
            connect_timeout: CONNECT_TIMEOUT,
            write_interval: WRITE_INTERVAL,
            detected: AtomicBool::new(false),
            state,
        }
    }

    pub fn with_write_interval(mut self, write_interval: Duration) -> Self {
        self.write_interval = write_interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Read-only view of the connection state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Runs one full cycle. Errors are returned only for discovery failures;
    /// connect and session failures are folded into the outcome.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome> {
        // The state belongs to the session holding the guard; leave it alone.
        if self.detected.load(Ordering::SeqCst) {
            warn!("{} already detected, skipping discovery", self.address);
            return Ok(CycleOutcome::Suppressed);
        }

        self.set_state(ConnectionState::Scanning);
        let device = match self.radio.discover(&self.address, cancel).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                self.set_state(ConnectionState::Idle);
                return Ok(CycleOutcome::Cancelled);
            }
            Err(e) => {
                self.set_state(ConnectionState::Idle);
                return Err(e);
            }
        };

        if self.detected.swap(true, Ordering::SeqCst) {
            warn!("{} already detected, ignoring advertisement", self.address);
            return Ok(CycleOutcome::Suppressed);
        }

        let link = match tokio::time::timeout(self.connect_timeout, self.radio.connect(device)).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => return Ok(self.connect_failed(e)),
            Err(_) => {
                return Ok(self.connect_failed(BridgeError::BleLink(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                ))));
            }
        };
        self.set_state(ConnectionState::Connected);
        info!("Connected: {}", self.address);

        let mut session = SessionGuard::new(link);
        let result = self.run_session(&mut session, cancel).await;

        self.set_state(ConnectionState::Disconnecting);
        session.release().await;
        self.detected.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Idle);

        Ok(match result {
            Ok(frames_sent) => {
                info!("Session stopped after {} frames", frames_sent);
                CycleOutcome::SessionStopped { frames_sent }
            }
            Err(e) => {
                error!("{}", e);
                error!("Write failed, back to scanning");
                CycleOutcome::SessionFailed(e)
            }
        })
    }

    fn connect_failed(&self, e: BridgeError) -> CycleOutcome {
        warn!("Connection to {} failed: {}", self.address, e);
        self.detected.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Idle);
        CycleOutcome::ConnectFailed(e)
    }

    /// Subscribes to commands, then runs the write loop until it stops.
    async fn run_session(&self, session: &mut SessionGuard<R::Link>, cancel: &CancellationToken) -> Result<u64> {
        let link = session.link();

        let notifications = link.subscribe().await?;
        session.attach(self.notification_handler.setup_notifications(notifications));

        run_write_loop(
            &*link,
            self.backend.as_ref(),
            &self.entity_map,
            self.write_interval,
            cancel,
        )
        .await
    }
}
