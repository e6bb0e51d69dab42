//! Stage configuration and build-time validation.

use std::collections::HashMap;
use std::sync::Arc;

use logpipe_record::Record;
use logpipe_state::StateManager;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::component::Component;
use crate::context::ProcessContext;
use crate::error::{ConfigurationError, ProcessorError};
use crate::property::validate_properties;
use crate::registry::ComponentRegistry;

/// One processor or parser block of a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    /// Registry type name, e.g. `SelectDistinctRecords`
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, deserialize_with = "deserialize_configuration")]
    pub configuration: HashMap<String, String>,
}

impl ComponentConfig {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            documentation: None,
            configuration: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ScalarValue>),
}

impl ScalarValue {
    fn into_text(self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(n) => n.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Text(s) => s,
            ScalarValue::List(items) => items
                .into_iter()
                .map(ScalarValue::into_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Accept YAML scalars of any kind as property strings.
///
/// Lists become comma separated values; null entries are dropped.
pub fn deserialize_configuration<'de, D>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Option<ScalarValue>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v.into_text())))
        .collect())
}

/// A validated, initialized component at one position of a stream.
#[derive(Clone)]
pub struct Stage {
    name: String,
    context: ProcessContext,
    component: Arc<Component>,
}

impl Stage {
    /// Create, validate and initialize the component named by `config`.
    ///
    /// Every problem found is reported in one [`ConfigurationError`].
    pub async fn build(
        config: &ComponentConfig,
        identifier: &str,
        registry: &ComponentRegistry,
        state: Option<StateManager>,
    ) -> Result<Stage, ConfigurationError> {
        let mut problems = ConfigurationError::new();

        let mut component = match registry.create(&config.component) {
            Ok(component) => component,
            Err(e) => {
                problems.push(identifier, "component", e.to_string());
                return Err(problems);
            }
        };

        let descriptors = component.properties();
        let (found, dynamic) = validate_properties(
            identifier,
            &descriptors,
            |name| component.dynamic_property(name),
            &config.configuration,
        );
        found.into_result()?;

        let mut context = ProcessContext::new(
            identifier,
            &config.component,
            descriptors,
            dynamic,
            config.configuration.clone(),
        );
        if let Some(state) = state {
            context = context.with_state(state);
        }

        for result in component.custom_validate(&context) {
            if !result.valid {
                problems.push(identifier, result.subject, result.explanation);
            }
        }
        problems.into_result()?;

        if let Err(e) = component.init(&context).await {
            let mut problems = ConfigurationError::new();
            problems.push(identifier, "component", format!("initialization failed: {e:#}"));
            return Err(problems);
        }

        debug!(
            "Built {} stage '{}' of type {}",
            component.kind(),
            identifier,
            config.component
        );
        Ok(Stage {
            name: config.name.clone(),
            context,
            component: Arc::new(component),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        self.context.identifier()
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    pub fn is_parser(&self) -> bool {
        matches!(*self.component, Component::Parser(_))
    }

    pub fn kind(&self) -> &'static str {
        self.component.kind()
    }

    pub async fn process(
        &self,
        ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        match &*self.component {
            Component::Processor(p) => p.process(ctx, records).await,
            Component::Parser(_) => Err(self.wrong_kind("processor").into()),
        }
    }

    pub async fn parse(
        &self,
        ctx: &ProcessContext,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<Vec<Record>> {
        match &*self.component {
            Component::Parser(p) => p.parse(ctx, key, value).await,
            Component::Processor(_) => Err(self.wrong_kind("parser").into()),
        }
    }

    fn wrong_kind(&self, expected: &'static str) -> ProcessorError {
        ProcessorError::WrongStageKind {
            stage: self.identifier().to_string(),
            expected,
            actual: self.kind(),
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        processors: Vec<ComponentConfig>,
    }

    #[test]
    fn test_configuration_accepts_any_scalar() {
        let yaml = r#"
processors:
  - name: distinct
    component: SelectDistinctRecords
    documentation: drop duplicates
    configuration:
      filtering.field: user
      debug: true
      page.size: 10
      ratio: 0.5
      topics: [a, b]
      unset: ~
  - name: bare
    component: DebugRecords
"#;
        let parsed: Wrapper = serde_yaml::from_str(yaml).unwrap();
        let first = &parsed.processors[0];
        assert_eq!(first.configuration["filtering.field"], "user");
        assert_eq!(first.configuration["debug"], "true");
        assert_eq!(first.configuration["page.size"], "10");
        assert_eq!(first.configuration["ratio"], "0.5");
        assert_eq!(first.configuration["topics"], "a,b");
        assert!(!first.configuration.contains_key("unset"));
        assert!(parsed.processors[1].configuration.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_component_is_reported() {
        let config = ComponentConfig::new("x", "NoSuchThing");
        let err = Stage::build(&config, "s.x", &ComponentRegistry::standard(), None)
            .await
            .unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].explanation.contains("NoSuchThing"));
    }

    #[tokio::test]
    async fn test_wrong_stage_kind() {
        let config = ComponentConfig::new("p", "RawLineParser");
        let stage = Stage::build(&config, "s.p", &ComponentRegistry::standard(), None)
            .await
            .unwrap();
        assert!(stage.is_parser());
        let err = stage
            .process(stage.context(), vec![Record::new("t")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a processor"));
    }
}
