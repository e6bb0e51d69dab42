use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Visibility of a state map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Private to one worker
    Local,
    /// Shared by all instances of a processor
    Cluster,
}

impl Scope {
    /// Get the string representation of this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Cluster => "cluster",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a processor's state in one scope.
///
/// `version` is 0 for a map that was never written and grows by one with
/// every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMap {
    scope: Scope,
    version: u64,
    entries: HashMap<String, String>,
}

impl StateMap {
    pub fn new(scope: Scope, version: u64, entries: HashMap<String, String>) -> Self {
        Self {
            scope,
            version,
            entries,
        }
    }

    /// A map that has never been stored.
    pub fn empty(scope: Scope) -> Self {
        Self::new(scope, 0, HashMap::new())
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether anything was ever stored for this map.
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    pub fn into_entries(self) -> HashMap<String, String> {
        self.entries
    }
}
