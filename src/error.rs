//! Error taxonomy shared by every layer of the bridge.

use thiserror::Error;

/// Errors raised by the bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Backend unreachable or answered with a non-2xx status.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Malformed JSON from the backend or malformed command text from the peripheral.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A protocol key required by the sensor frame has no state.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A state string could not be parsed into its frame type.
    #[error("format error: field {key} has unparseable value {value:?}")]
    Format { key: String, value: String },

    /// Connect, write or notify failure from the radio layer.
    #[error("BLE link error: {0}")]
    BleLink(String),

    /// Duplicate or missing configuration entries.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Only configuration errors stop the process; everything else is retried
    /// by the reconnect cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<bluest::Error> for BridgeError {
    fn from(err: bluest::Error) -> Self {
        Self::BleLink(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
