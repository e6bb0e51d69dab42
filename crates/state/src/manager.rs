//! Per-processor handle onto a state store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::scope::{Scope, StateMap};
use crate::store::{Result, StateKey, StateStore};

/// State access bound to one processor identity and one worker.
///
/// The engine hands a manager to each processor through its execution
/// context; processors never see keys of other components.
#[derive(Clone)]
pub struct StateManager {
    store: Arc<dyn StateStore>,
    component: String,
    worker: String,
}

impl StateManager {
    pub fn new(
        store: Arc<dyn StateStore>,
        component: impl Into<String>,
        worker: impl Into<String>,
    ) -> Self {
        Self {
            store,
            component: component.into(),
            worker: worker.into(),
        }
    }

    /// Same component and store, another worker.
    pub fn for_worker(&self, worker: impl Into<String>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            component: self.component.clone(),
            worker: worker.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    fn key(&self, scope: Scope) -> StateKey {
        StateKey::new(self.component.clone(), scope, self.worker.clone())
    }

    pub async fn get_state(&self, scope: Scope) -> Result<StateMap> {
        self.store.load(&self.key(scope)).await
    }

    /// Replace the map for `scope`; last writer wins.
    pub async fn set_state(&self, entries: HashMap<String, String>, scope: Scope) -> Result<()> {
        self.store.store(&self.key(scope), entries).await.map(|_| ())
    }

    /// Replace the map only if nobody wrote it since `old` was read.
    pub async fn replace_state(
        &self,
        old: &StateMap,
        entries: HashMap<String, String>,
        scope: Scope,
    ) -> Result<bool> {
        self.store
            .compare_and_store(&self.key(scope), old.version(), entries)
            .await
    }

    pub async fn clear_state(&self, scope: Scope) -> Result<()> {
        self.store.clear(&self.key(scope)).await
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("component", &self.component)
            .field("worker", &self.worker)
            .finish()
    }
}
