//! Constants used throughout the application
//! This module contains the fixed identifiers of the display peripheral and
//! the timing values of the bridge.

use std::time::Duration;

use uuid::Uuid;

/// Hardware address of the display peripheral
pub const PERIPHERAL_ADDRESS: &str = "80:E1:26:1D:3D:92";

/// Characteristic the sensor frame is written to (no response requested)
pub const UUID_FRAME_WRITE_CHAR: Uuid = Uuid::from_u128(0x19ed82ae_ed21_4c9d_4145_228e62fe0000);

/// Characteristic the peripheral sends command text on
pub const UUID_COMMAND_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x19ed82ae_ed21_4c9d_4145_228e61fe0000);

/// Upper bound for a single connection attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between two frames pushed to the peripheral
pub const WRITE_INTERVAL: Duration = Duration::from_secs(5);

/// Delay between two discovery cycles
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timeout applied to every backend HTTP request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification payloads buffered between the radio and the command handler
pub const NOTIFICATION_QUEUE_DEPTH: usize = 16;
