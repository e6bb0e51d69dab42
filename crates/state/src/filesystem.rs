//! Filesystem-based state storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::scope::{Scope, StateMap};
use crate::store::{Result, StateKey, StateStore};

/// Filesystem implementation of [`StateStore`].
///
/// Stores each state map as a JSON file in a directory. Files are replaced
/// through a temporary file and a rename, so readers never observe a
/// partial write.
pub struct FilesystemStateStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

/// On-disk representation of a state map.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredState {
    component: String,
    scope: Scope,
    worker: Option<String>,
    version: u64,
    updated_at: DateTime<Utc>,
    entries: HashMap<String, String>,
}

impl FilesystemStateStore {
    /// Create a new store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &StateKey) -> PathBuf {
        let mut name = format!("{}__{}", sanitize(&key.component), key.scope);
        if let Some(worker) = &key.worker {
            name.push_str("__");
            name.push_str(&sanitize(worker));
        }
        self.dir.join(format!("{name}.json"))
    }

    async fn read_stored(&self, key: &StateKey) -> Result<Option<StoredState>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_stored(&self, key: &StateKey, stored: &StoredState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(stored)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            "Stored {} state v{} to {}",
            key.scope,
            stored.version,
            path.display()
        );
        Ok(())
    }

    fn stored(key: &StateKey, version: u64, entries: HashMap<String, String>) -> StoredState {
        StoredState {
            component: key.component.clone(),
            scope: key.scope,
            worker: key.worker.clone(),
            version,
            updated_at: Utc::now(),
            entries,
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StateStore for FilesystemStateStore {
    async fn load(&self, key: &StateKey) -> Result<StateMap> {
        Ok(match self.read_stored(key).await? {
            Some(stored) => StateMap::new(key.scope, stored.version, stored.entries),
            None => StateMap::empty(key.scope),
        })
    }

    async fn store(&self, key: &StateKey, entries: HashMap<String, String>) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read_stored(key)
            .await?
            .map(|s| s.version)
            .unwrap_or(0);
        let stored = Self::stored(key, current + 1, entries);
        self.write_stored(key, &stored).await?;
        Ok(stored.version)
    }

    async fn compare_and_store(
        &self,
        key: &StateKey,
        expected_version: u64,
        entries: HashMap<String, String>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read_stored(key)
            .await?
            .map(|s| s.version)
            .unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }
        let stored = Self::stored(key, current + 1, entries);
        self.write_stored(key, &stored).await?;
        Ok(true)
    }
}
