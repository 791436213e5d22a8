//! In-memory backend and radio used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::entity_map::EntityMap;
use crate::core::bluetooth::{PeripheralLink, Radio};
use crate::error::{BridgeError, Result};
use crate::hass::Backend;

pub fn sample_entity_map() -> EntityMap {
    EntityMap::from_pairs([
        ("sensor.a", "x"),
        ("sensor.bath_temperature", "bt"),
        ("sensor.bath_humidity", "bh"),
        ("sensor.kitchen_temperature", "kt"),
        ("sensor.kitchen_humidity", "kh"),
        ("sensor.outdoor_temperature", "ot"),
        ("sensor.outdoor_humidity", "oh"),
        ("switch.dehumidifier", "dh"),
        ("switch.air_duct", "ad"),
        ("sensor.co", "co"),
        ("sensor.pm", "pm"),
    ])
    .unwrap()
}

pub fn sample_states() -> HashMap<String, String> {
    [
        ("sensor.a", "on"),
        ("sensor.bath_temperature", "21.5"),
        ("sensor.bath_humidity", "55.0"),
        ("sensor.kitchen_temperature", "23.25"),
        ("sensor.kitchen_humidity", "41.0"),
        ("sensor.outdoor_temperature", "-2.5"),
        ("sensor.outdoor_humidity", "80.0"),
        ("switch.dehumidifier", "on"),
        ("switch.air_duct", "off"),
        ("sensor.co", "400"),
        ("sensor.pm", "12"),
        ("light.untracked", "on"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Default)]
pub struct MockBackend {
    states: Mutex<HashMap<String, String>>,
    fetch_error: Mutex<Option<BridgeError>>,
    fail_toggles: bool,
    toggled: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl MockBackend {
    pub fn with_states(states: HashMap<String, String>) -> Self {
        Self {
            states: Mutex::new(states),
            ..Self::default()
        }
    }

    pub fn failing_toggles() -> Self {
        Self {
            fail_toggles: true,
            ..Self::default()
        }
    }

    pub fn set_fetch_error(&self, err: BridgeError) {
        *self.fetch_error.lock().unwrap() = Some(err);
    }

    pub fn toggled(&self) -> Vec<String> {
        self.toggled.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_states(&self) -> Result<HashMap<String, String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.states.lock().unwrap().clone())
    }

    async fn toggle(&self, entity_id: &str) -> Result<()> {
        self.toggled.lock().unwrap().push(entity_id.to_string());
        if self.fail_toggles {
            return Err(BridgeError::RemoteUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct LinkProbe {
    pub writes: Mutex<Vec<Vec<u8>>>,
    pub disconnects: AtomicUsize,
    connected: AtomicBool,
    fail_on_write: Option<usize>,
    notifications: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

impl LinkProbe {
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Pushes a payload as if the peripheral had notified it.
    pub async fn notify(&self, payload: &[u8]) {
        let sender = self.notifications.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(payload.to_vec()).await;
        }
    }
}

#[derive(Clone)]
pub struct MockLink(pub Arc<LinkProbe>);

#[async_trait]
impl PeripheralLink for MockLink {
    async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        let mut writes = self.0.writes.lock().unwrap();
        writes.push(frame.to_vec());
        if Some(writes.len()) == self.0.fail_on_write {
            return Err(BridgeError::BleLink("write not permitted".to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(8);
        *self.0.notifications.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.0.disconnects.fetch_add(1, Ordering::SeqCst);
        self.0.connected.store(false, Ordering::SeqCst);
        self.0.notifications.lock().unwrap().take();
        Ok(())
    }
}

/// Scripted radio. Every discovery finds the peripheral until
/// `max_discoveries` is reached; the next one cancels `stop`.
pub struct MockRadio {
    pub discoveries: AtomicUsize,
    pub max_discoveries: usize,
    pub connect_failures: AtomicUsize,
    pub hang_on_connect: bool,
    pub fail_on_write: Option<usize>,
    pub stop: CancellationToken,
    pub links: Mutex<Vec<Arc<LinkProbe>>>,
}

impl MockRadio {
    pub fn new(max_discoveries: usize, stop: CancellationToken) -> Self {
        Self {
            discoveries: AtomicUsize::new(0),
            max_discoveries,
            connect_failures: AtomicUsize::new(0),
            hang_on_connect: false,
            fail_on_write: None,
            stop,
            links: Mutex::new(Vec::new()),
        }
    }

    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    pub fn link(&self, index: usize) -> Arc<LinkProbe> {
        self.links.lock().unwrap()[index].clone()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl Radio for Arc<MockRadio> {
    type Device = String;
    type Link = MockLink;

    async fn discover(&self, address: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        let count = self.discoveries.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.max_discoveries {
            self.stop.cancel();
            cancel.cancelled().await;
            return Ok(None);
        }
        Ok(Some(address.to_string()))
    }

    async fn connect(&self, _device: String) -> Result<MockLink> {
        if self.hang_on_connect {
            std::future::pending::<()>().await;
        }
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BridgeError::BleLink("connection refused".to_string()));
        }

        let probe = Arc::new(LinkProbe {
            connected: AtomicBool::new(true),
            fail_on_write: self.fail_on_write,
            ..LinkProbe::default()
        });
        self.links.lock().unwrap().push(probe.clone());
        Ok(MockLink(probe))
    }
}
