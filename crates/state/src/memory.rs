//! In-memory state storage.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::scope::StateMap;
use crate::store::{Result, StateKey, StateStore};

/// Process-local implementation of [`StateStore`].
///
/// Shared between processors through an `Arc`; contents are lost when the
/// process exits.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    maps: RwLock<HashMap<StateKey, StateMap>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of maps written so far.
    pub async fn len(&self) -> usize {
        self.maps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.maps.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &StateKey) -> Result<StateMap> {
        let maps = self.maps.read().await;
        Ok(maps
            .get(key)
            .cloned()
            .unwrap_or_else(|| StateMap::empty(key.scope)))
    }

    async fn store(&self, key: &StateKey, entries: HashMap<String, String>) -> Result<u64> {
        let mut maps = self.maps.write().await;
        let version = maps.get(key).map(StateMap::version).unwrap_or(0) + 1;
        maps.insert(key.clone(), StateMap::new(key.scope, version, entries));
        Ok(version)
    }

    async fn compare_and_store(
        &self,
        key: &StateKey,
        expected_version: u64,
        entries: HashMap<String, String>,
    ) -> Result<bool> {
        let mut maps = self.maps.write().await;
        let current = maps.get(key).map(StateMap::version).unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        maps.insert(key.clone(), StateMap::new(key.scope, current + 1, entries));
        Ok(true)
    }
}
