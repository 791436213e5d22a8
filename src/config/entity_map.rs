//! Bidirectional mapping between backend entity ids and short protocol keys.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// Immutable entity id <-> protocol key table.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
    by_entity: HashMap<String, String>,
    by_key: HashMap<String, String>,
}

impl EntityMap {
    /// Builds the map from `(entity_id, key)` pairs. Fails if either side repeats.
    pub fn from_pairs<I, E, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (E, K)>,
        E: Into<String>,
        K: Into<String>,
    {
        let mut by_entity = HashMap::new();
        let mut by_key = HashMap::new();

        for (entity, key) in pairs {
            let entity = entity.into();
            let key = key.into();

            if let Some(previous) = by_key.get(&key) {
                return Err(BridgeError::Config(format!(
                    "protocol key {:?} is mapped by both {:?} and {:?}",
                    key, previous, entity
                )));
            }
            if by_entity.contains_key(&entity) {
                return Err(BridgeError::Config(format!(
                    "entity {:?} is listed more than once",
                    entity
                )));
            }

            by_key.insert(key.clone(), entity.clone());
            by_entity.insert(entity, key);
        }

        Ok(Self { by_entity, by_key })
    }

    pub fn resolve_key(&self, entity_id: &str) -> Option<&str> {
        self.by_entity.get(entity_id).map(String::as_str)
    }

    pub fn resolve_entity(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Keeps only the tracked entities of a backend state dump, re-keyed by protocol key.
    pub fn project(&self, states: &HashMap<String, String>) -> HashMap<String, String> {
        states
            .iter()
            .filter_map(|(entity, state)| {
                self.resolve_key(entity)
                    .map(|key| (key.to_string(), state.clone()))
            })
            .collect()
    }
}
