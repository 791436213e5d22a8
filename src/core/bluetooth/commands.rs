//! Inbound command handling
//! Translates `key:verb` commands from the peripheral into backend actions.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::config::entity_map::EntityMap;
use crate::core::frame::{Verb, decode_commands};
use crate::hass::Backend;

/// Executes peripheral commands against the backend.
#[derive(Clone)]
pub struct CommandHandler {
    backend: Arc<dyn Backend>,
    entity_map: Arc<EntityMap>,
}

impl CommandHandler {
    pub fn new(backend: Arc<dyn Backend>, entity_map: Arc<EntityMap>) -> Self {
        Self {
            backend,
            entity_map,
        }
    }

    /// Handles one notification payload.
    ///
    /// Never fails: decode errors, unknown keys and unknown verbs are logged.
    /// Each toggle runs on its own task; the handles are returned so callers
    /// may await them, but dropping them leaves the toggles running.
    pub fn handle_payload(&self, payload: &[u8]) -> Vec<JoinHandle<()>> {
        let commands = match decode_commands(payload) {
            Ok(commands) => commands,
            Err(e) => {
                error!("Dropping command payload {:?}: {}", String::from_utf8_lossy(payload), e);
                return Vec::new();
            }
        };

        let mut dispatched = Vec::new();
        for command in commands {
            let Some(entity) = self.entity_map.resolve_entity(&command.key) else {
                warn!("Unknown command key {:?}, skipping", command.key);
                continue;
            };

            match command.verb {
                Verb::Toggle => {
                    info!("Sending command: {} | [Toggle]", entity);
                    let backend = self.backend.clone();
                    let entity = entity.to_string();
                    dispatched.push(tokio::spawn(async move {
                        if let Err(e) = backend.toggle(&entity).await {
                            error!("Failed to toggle {}: {}", entity, e);
                        }
                    }));
                }
                Verb::Unknown(verb) => {
                    warn!("Verb {:?} for {} is not implemented", verb, entity);
                }
            }
        }
        dispatched
    }
}
