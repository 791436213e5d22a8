use std::sync::Arc;

use anyhow::{Context, Result};
use hass_ble_bridge_lib::config::{AppConfig, DEFAULT_CONFIG_FILE_NAME};
use hass_ble_bridge_lib::core::bluetooth::constants::{HTTP_TIMEOUT, PERIPHERAL_ADDRESS};
use hass_ble_bridge_lib::core::bluetooth::{BluestRadio, ConnectionManager};
use hass_ble_bridge_lib::core::Supervisor;
use hass_ble_bridge_lib::hass::HassClient;
use hass_ble_bridge_lib::logging;
use log::{error, info};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    if logging::init(log::LevelFilter::Info).is_err() {
        eprintln!("Logger already initialised");
    }

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE_NAME.to_string());
    let config = AppConfig::load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let backend = Arc::new(HassClient::from_config(&config, HTTP_TIMEOUT)?);
    let entity_map = Arc::new(config.entity_map);

    info!("Initializing Bluetooth adapter...");
    let radio = BluestRadio::new()
        .await
        .context("Failed to initialise the Bluetooth adapter")?;

    let manager = ConnectionManager::new(radio, PERIPHERAL_ADDRESS, backend, entity_map);
    let supervisor = Supervisor::new(manager);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Stop requested, shutting down...");
                signal_cancel.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    supervisor.run(cancel).await;
    Ok(())
}
