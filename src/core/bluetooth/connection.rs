//! Bluetooth connection handling for the display peripheral
//! This module connects to the peripheral, locates its two characteristics
//! and exposes them as a [`PeripheralLink`].

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Uuid};
use log::{info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{UUID_COMMAND_NOTIFY_CHAR, UUID_FRAME_WRITE_CHAR};
use crate::core::bluetooth::notification::forward_notifications;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{PeripheralLink, Radio};
use crate::error::{BridgeError, Result};

/// [`Radio`] backed by the host's default bluest adapter.
#[derive(Clone)]
pub struct BluestRadio {
    adapter: Adapter,
    scanner: BluetoothScanner,
}

impl BluestRadio {
    /// Opens the default adapter and waits until it is powered.
    pub async fn new() -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BridgeError::BleLink("No Bluetooth adapter found".to_string()))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        Ok(Self {
            scanner: BluetoothScanner::new(adapter.clone()),
            adapter,
        })
    }

    async fn find_characteristics(device: &Device) -> Result<(Characteristic, Characteristic)> {
        info!("Discovering services...");
        let mut write_char_opt = None;
        let mut notify_char_opt = None;

        for service in device.discover_services().await? {
            for char in service.discover_characteristics().await? {
                let uuid = char.uuid();
                if uuid == UUID_FRAME_WRITE_CHAR {
                    info!("Found write characteristic: {}", uuid);
                    write_char_opt = Some(char);
                } else if uuid == UUID_COMMAND_NOTIFY_CHAR {
                    info!("Found notification characteristic: {}", uuid);
                    notify_char_opt = Some(char);
                }
            }
        }

        let write_char = write_char_opt.ok_or_else(|| missing_char(UUID_FRAME_WRITE_CHAR))?;
        let notify_char = notify_char_opt.ok_or_else(|| missing_char(UUID_COMMAND_NOTIFY_CHAR))?;
        Ok((write_char, notify_char))
    }
}

fn missing_char(uuid: Uuid) -> BridgeError {
    BridgeError::BleLink(format!("characteristic not found: {}", uuid))
}

#[async_trait]
impl Radio for BluestRadio {
    type Device = Device;
    type Link = BluestLink;

    async fn discover(&self, address: &str, cancel: &CancellationToken) -> Result<Option<Device>> {
        self.scanner.scan_for(address, cancel).await
    }

    async fn connect(&self, device: Device) -> Result<BluestLink> {
        let id = device.id().to_string();
        if !device.is_connected().await {
            info!("Initiating connection to {}...", id);
            self.adapter.connect_device(&device).await?;
        }
        info!("Connected: {}", device.is_connected().await);

        let (write_char, notify_char) = match Self::find_characteristics(&device).await {
            Ok(chars) => chars,
            Err(e) => {
                // The link is up but unusable; do not leave it dangling.
                if let Err(disconnect_err) = self.adapter.disconnect_device(&device).await {
                    warn!("Failed to disconnect {} after setup error: {}", id, disconnect_err);
                }
                return Err(e);
            }
        };

        Ok(BluestLink {
            adapter: self.adapter.clone(),
            device,
            write_char,
            notify_char,
            notify_task: Mutex::new(None),
        })
    }
}

/// Connected peripheral with its resolved characteristics.
pub struct BluestLink {
    adapter: Adapter,
    device: Device,
    write_char: Characteristic,
    notify_char: Characteristic,
    notify_task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl PeripheralLink for BluestLink {
    async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        self.write_char.write_without_response(frame).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>> {
        info!("Setting up notifications...");
        let (handle, rx) = forward_notifications(self.notify_char.clone()).await?;
        if let Some(previous) = self.notify_task.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn is_connected(&self) -> bool {
        self.device.is_connected().await
    }

    /// Disconnect from the peripheral (bluest version)
    async fn disconnect(&self) -> Result<()> {
        if let Some(handle) = self.notify_task.lock().await.take() {
            handle.abort();
        }

        if self.device.is_connected().await {
            info!("Disconnecting from device {}", self.device.id());
            self.adapter.disconnect_device(&self.device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", self.device.id());
        }
        Ok(())
    }
}
