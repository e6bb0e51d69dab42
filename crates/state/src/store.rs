//! State storage trait and shared types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::scope::{Scope, StateMap};

/// Errors raised by state backends.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Identifies one state map in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    /// Processor identity, e.g. `"stream.stage"`
    pub component: String,
    /// Map scope
    pub scope: Scope,
    /// Owning worker; only set for `Local` scope
    pub worker: Option<String>,
}

impl StateKey {
    pub fn new(component: impl Into<String>, scope: Scope, worker: impl Into<String>) -> Self {
        let worker = match scope {
            Scope::Local => Some(worker.into()),
            Scope::Cluster => None,
        };
        Self {
            component: component.into(),
            scope,
            worker,
        }
    }
}

/// Trait for state storage backends.
///
/// Backends only need to provide atomic replacement of a whole map;
/// versioning semantics are the same for every implementation.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a map. Returns an empty map (version 0) if nothing was stored.
    async fn load(&self, key: &StateKey) -> Result<StateMap>;

    /// Replace a map unconditionally and return its new version.
    async fn store(&self, key: &StateKey, entries: HashMap<String, String>) -> Result<u64>;

    /// Replace a map only if its current version equals `expected_version`.
    ///
    /// Returns `false`, leaving the map untouched, on a version mismatch.
    async fn compare_and_store(
        &self,
        key: &StateKey,
        expected_version: u64,
        entries: HashMap<String, String>,
    ) -> Result<bool>;

    /// Remove every entry; the version still advances.
    async fn clear(&self, key: &StateKey) -> Result<()> {
        self.store(key, HashMap::new()).await.map(|_| ())
    }
}
