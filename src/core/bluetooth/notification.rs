//! Notification handling for the display peripheral
//! This module subscribes to the command characteristic and feeds every
//! payload to the command handler.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::bluetooth::constants::NOTIFICATION_QUEUE_DEPTH;
use crate::core::bluetooth::commands::CommandHandler;
use crate::error::{BridgeError, Result};

/// Subscribes to `notify_char` on a background task and forwards each payload.
///
/// Returns once the subscription is active, so subscribe failures surface to
/// the caller instead of only being logged.
pub async fn forward_notifications(
    notify_char: Characteristic,
) -> Result<(JoinHandle<()>, mpsc::Receiver<Vec<u8>>)> {
    let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_DEPTH);
    let (ready_tx, ready_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut notification_stream = match notify_char.notify().await {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(BridgeError::from(e)));
                return;
            }
        };

        info!("Listening for peripheral notifications...");
        while let Some(result) = notification_stream.next().await {
            match result {
                Ok(value) => {
                    if tx.send(value).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error in notification stream: {}", e);
                    break;
                }
            }
        }
        info!("Notification stream ended");
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok((handle, rx)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(BridgeError::BleLink(
            "notification task ended before subscribing".to_string(),
        )),
    }
}

/// Drains inbound payloads into the command handler.
#[derive(Clone)]
pub struct NotificationHandler {
    command_handler: CommandHandler,
}

impl NotificationHandler {
    pub fn new(command_handler: CommandHandler) -> Self {
        Self { command_handler }
    }

    /// Starts the handler task. It ends when the receiver closes.
    pub fn setup_notifications(&self, notifications: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
        let command_handler = self.command_handler.clone();
        tokio::spawn(async move {
            Self::process_notifications(notifications, command_handler).await;
        })
    }

    async fn process_notifications(
        mut notifications: mpsc::Receiver<Vec<u8>>,
        command_handler: CommandHandler,
    ) {
        while let Some(value) = notifications.recv().await {
            debug!("Received peripheral data: {:?}", value);
            // Dispatched toggles run detached; the next payload is not held up.
            let _ = command_handler.handle_payload(&value);
        }
        debug!("Command channel closed");
    }
}
