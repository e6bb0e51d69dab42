//! Helpers for exercising components outside an engine.

use std::collections::HashMap;
use std::sync::Arc;

use logpipe_state::{StateManager, StateStore};

use crate::error::ConfigurationError;
use crate::registry::ComponentRegistry;
use crate::stage::{ComponentConfig, Stage};

/// Builds a single stage from a component type and a set of properties.
///
/// ```
/// # tokio_test::block_on(async {
/// use logpipe_processor::testing::TestRunner;
///
/// let stage = TestRunner::new("SelectDistinctRecords")
///     .set_property("filtering.field", "user")
///     .build()
///     .await
///     .unwrap();
/// assert!(!stage.is_parser());
/// # });
/// ```
pub struct TestRunner {
    registry: ComponentRegistry,
    component: String,
    properties: HashMap<String, String>,
    state: Option<Arc<dyn StateStore>>,
}

impl TestRunner {
    /// Runner over the standard registry.
    pub fn new(component: impl Into<String>) -> Self {
        Self::with_registry(ComponentRegistry::standard(), component)
    }

    pub fn with_registry(registry: ComponentRegistry, component: impl Into<String>) -> Self {
        Self {
            registry,
            component: component.into(),
            properties: HashMap::new(),
            state: None,
        }
    }

    pub fn set_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state = Some(store);
        self
    }

    /// Validate and initialize the stage, as a pipeline build would.
    pub async fn build(&self) -> Result<Stage, ConfigurationError> {
        let identifier = format!("test.{}", self.component);
        let config = ComponentConfig {
            name: self.component.clone(),
            component: self.component.clone(),
            documentation: None,
            configuration: self.properties.clone(),
        };
        let state = self
            .state
            .as_ref()
            .map(|store| StateManager::new(Arc::clone(store), identifier.clone(), "test"));
        Stage::build(&config, &identifier, &self.registry, state).await
    }
}
