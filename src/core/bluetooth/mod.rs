//! Bluetooth functionality for the bridge
//! This module handles discovery of the display peripheral, the connection
//! lifecycle, outbound frame writes and inbound command notifications.

pub mod commands;
mod connection;
pub mod constants;
mod manager;
mod notification;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use commands::CommandHandler;
pub use connection::{BluestLink, BluestRadio};
pub use manager::{ConnectionManager, CycleOutcome};
pub use notification::NotificationHandler;
pub use scanner::{BluetoothScanner, extract_mac_address};
pub use types::{ConnectionState, PeripheralLink, Radio};
