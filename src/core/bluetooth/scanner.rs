use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, Result};

/// Finds the configured peripheral among BLE advertisements.
#[derive(Clone)]
pub struct BluetoothScanner {
    adapter: Adapter,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scans until `address` advertises, then drops the scan stream, which
    /// stops discovery. Repeated advertisements are left to the adapter's
    /// discovery filter.
    pub async fn scan_for(&self, address: &str, cancel: &CancellationToken) -> Result<Option<Device>> {
        // A peripheral that is still connected from an earlier run does not advertise.
        info!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            if Self::matches_address(&device, address) {
                info!("Detected: {} (already connected)", address);
                return Ok(Some(device));
            }
        }

        info!("Starting bluetooth scan for {}", address);
        let mut scan_stream = self.adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            debug!("Found device - Device: {:?}, RSSI: {:?}", device, discovered_device.rssi);
                            if Self::matches_address(&device, address) {
                                info!("Detected: {}", address);
                                return Ok(Some(device));
                            }
                        }
                        None => {
                            return Err(BridgeError::BleLink(
                                "bluetooth scan stream has ended".to_string(),
                            ));
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Bluetooth scan cancelled.");
                    return Ok(None);
                }
            }
        }
    }

    fn matches_address(device: &Device, address: &str) -> bool {
        extract_mac_address(&device.id().to_string())
            .map(|mac| mac.eq_ignore_ascii_case(address))
            .unwrap_or(false)
    }
}

static MAC_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").ok());

/// Pulls the last MAC-looking group out of a platform device id.
pub fn extract_mac_address(device_id_str: &str) -> Option<String> {
    MAC_PATTERN
        .as_ref()?
        .find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().replace(['-', '_'], ":").to_uppercase())
}
