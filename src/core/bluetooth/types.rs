//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Lifecycle of the single peripheral connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Discovery and connection primitives of the radio stack.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Handle of an advertising device.
    type Device: Send;
    /// Established connection to the peripheral.
    type Link: PeripheralLink + 'static;

    /// Scans until a device with `address` advertises. Scanning stops when
    /// this returns. Returns `None` if `cancel` fired first.
    async fn discover(&self, address: &str, cancel: &CancellationToken) -> Result<Option<Self::Device>>;

    /// Connects without pairing. Callers bound this with a timeout.
    async fn connect(&self, device: Self::Device) -> Result<Self::Link>;
}

/// Operations on a connected peripheral.
#[async_trait]
pub trait PeripheralLink: Send + Sync {
    /// Writes to the outbound characteristic without requesting a response.
    async fn write_frame(&self, frame: &[u8]) -> Result<()>;

    /// Subscribes to the inbound characteristic. The receiver closes when the
    /// link goes away.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Vec<u8>>>;

    async fn is_connected(&self) -> bool;

    /// Tears the connection down, which also ends the subscription.
    async fn disconnect(&self) -> Result<()>;
}
