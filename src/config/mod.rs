pub mod entity_map;

use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value};
use tokio::fs;

use crate::config::entity_map::EntityMap;
use crate::core::frame::REQUIRED_KEYS;
use crate::error::{BridgeError, Result};

pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.json";

const HOST_KEY: &str = "host";
const TOKEN_KEY: &str = "token";

/// Startup configuration. Built once and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL, without trailing slash (e.g. http://homeassistant.local:8123)
    pub host: String,
    /// Long-lived access token.
    pub token: String,
    pub entity_map: EntityMap,
}

impl AppConfig {
    /// Loads the config from a JSON file.
    ///
    /// The file is a flat object: `host` and `token` are reserved, every other
    /// entry maps a backend entity id to its protocol key.
    pub async fn load_config(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_path_str = path.to_string_lossy().into_owned();

        let config_json = fs::read_to_string(path).await.map_err(|e| {
            BridgeError::Config(format!("cannot read {}: {}", file_path_str, e))
        })?;
        let config = Self::from_json(&config_json)?;

        info!(
            "Config loaded from {:?}: {} mapped entities",
            file_path_str,
            config.entity_map.len()
        );
        Ok(config)
    }

    pub fn from_json(config_json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(config_json)
            .map_err(|e| BridgeError::Config(format!("invalid JSON: {}", e)))?;
        let Value::Object(mut object) = value else {
            return Err(BridgeError::Config(
                "top level must be a JSON object".to_string(),
            ));
        };

        let host = take_string(&mut object, HOST_KEY)?
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(BridgeError::Config("host must not be empty".to_string()));
        }
        let token = take_string(&mut object, TOKEN_KEY)?;

        let mut pairs = Vec::with_capacity(object.len());
        for (entity, key) in object {
            match key {
                Value::String(key) => pairs.push((entity, key)),
                other => {
                    return Err(BridgeError::Config(format!(
                        "entity {:?} must map to a string key, got {}",
                        entity, other
                    )));
                }
            }
        }
        let entity_map = EntityMap::from_pairs(pairs)?;

        for key in REQUIRED_KEYS {
            if !entity_map.contains_key(key) {
                warn!(
                    "No entity is mapped to frame key {:?}; every poll will fail until it is configured",
                    key
                );
            }
        }

        Ok(Self {
            host,
            token,
            entity_map,
        })
    }
}

fn take_string(object: &mut Map<String, Value>, name: &str) -> Result<String> {
    match object.remove(name) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(BridgeError::Config(format!("{} must be a string", name))),
        None => Err(BridgeError::Config(format!("missing {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_are_split_from_entities() {
        let config = AppConfig::from_json(
            r#"{
                "host": "http://hass.local:8123/",
                "token": "abc",
                "sensor.bath_temperature": "bt",
                "switch.dehumidifier": "dh"
            }"#,
        )
        .unwrap();

        assert_eq!(config.host, "http://hass.local:8123");
        assert_eq!(config.token, "abc");
        assert_eq!(config.entity_map.len(), 2);
        assert_eq!(config.entity_map.resolve_entity("dh"), Some("switch.dehumidifier"));
        assert_eq!(config.entity_map.resolve_key("host"), None);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = AppConfig::from_json(r#"{"host": "http://h"}"#).unwrap_err();
        assert_eq!(err, BridgeError::Config("missing token".to_string()));
    }

    #[test]
    fn test_duplicate_protocol_key_is_config_error() {
        let err = AppConfig::from_json(
            r#"{"host": "http://h", "token": "t", "sensor.a": "x", "sensor.b": "x"}"#,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_string_key_is_rejected() {
        let err =
            AppConfig::from_json(r#"{"host": "http://h", "token": "t", "sensor.a": 3}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));

        let err = AppConfig::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
