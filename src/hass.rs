//! Home Assistant REST client
//! Only two endpoints are used: the full state dump and the switch toggle service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{BridgeError, Result};

/// Backend operations the bridge depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current state of every entity, keyed by entity id.
    async fn fetch_states(&self) -> Result<HashMap<String, String>>;

    /// Toggles a switch entity. Does not wait for or verify the new state.
    async fn toggle(&self, entity_id: &str) -> Result<()>;
}

/// One element of the `/api/states` response. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
}

/// reqwest-backed client for a Home Assistant instance.
#[derive(Clone)]
pub struct HassClient {
    client: Client,
    host: String,
    token: String,
}

impl HassClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(config: &AppConfig, timeout: Duration) -> Result<Self> {
        Self::new(config.host.clone(), config.token.clone(), timeout)
    }

    fn states_url(&self) -> String {
        format!("{}/api/states", self.host)
    }

    fn toggle_url(&self) -> String {
        format!("{}/api/services/switch/toggle", self.host)
    }
}

#[async_trait]
impl Backend for HassClient {
    async fn fetch_states(&self) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .get(self.states_url())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| BridgeError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::RemoteUnavailable(format!(
                "GET /api/states returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::RemoteUnavailable(e.to_string()))?;
        let states = parse_states(&body)?;
        debug!("Fetched {} entity states", states.len());
        Ok(states)
    }

    async fn toggle(&self, entity_id: &str) -> Result<()> {
        let body = serde_json::json!({ "entity_id": entity_id });

        let response = self
            .client
            .post(self.toggle_url())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::RemoteUnavailable(format!(
                "toggle {} returned {}",
                entity_id,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Parses a `/api/states` body into entity id -> state.
pub fn parse_states(body: &str) -> Result<HashMap<String, String>> {
    let entities: Vec<EntityState> = serde_json::from_str(body)
        .map_err(|e| BridgeError::Protocol(format!("malformed states JSON: {}", e)))?;

    Ok(entities
        .into_iter()
        .map(|entity| (entity.entity_id, entity.state))
        .collect())
}
