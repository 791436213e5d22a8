//! Home Assistant BLE bridge library
//! Pushes sensor frames to a BLE display and turns its button presses into
//! Home Assistant service calls.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod hass;
pub mod logging;

#[cfg(test)]
mod testing;

pub use error::{BridgeError, Result};
