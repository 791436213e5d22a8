//! Core functionality of the bridge
//! This module contains the BLE connection lifecycle, the frame codec and the
//! session loop that ties the peripheral to the backend.

pub mod bluetooth;
pub mod frame;
pub mod session;
pub mod supervisor;

// Re-export commonly used types
pub use bluetooth::{ConnectionManager, ConnectionState};
pub use frame::{BinaryFrame, SensorSnapshot};
pub use supervisor::Supervisor;
