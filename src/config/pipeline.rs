//! Pipeline document loading with environment variable substitution.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use logpipe_processor::stage::deserialize_configuration;
use logpipe_processor::ComponentConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Upper-case names only: `${field}` placeholders belong to record expressions.
static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var regex"));

/// Top level of a pipeline document.
///
/// ```yaml
/// version: 1
/// engine:
///   name: main
///   configuration:
///     batch.interval: 2s
///   streams:
///     - name: access_logs
///       configuration:
///         input.topics: raw_logs
///         output.topics: events
///         error.topics: errors
///       processors:
///         - name: parser
///           component: JsonEventParser
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, deserialize_with = "deserialize_configuration")]
    pub configuration: HashMap<String, String>,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, deserialize_with = "deserialize_configuration")]
    pub configuration: HashMap<String, String>,
    #[serde(default)]
    pub processors: Vec<ComponentConfig>,
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// Lower-case placeholders such as `${host}` are left for per-record
/// expression evaluation.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                if !missing.iter().any(|m| m == var_name) {
                    missing.push(var_name.to_string());
                }
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result)
}

/// Parse a pipeline YAML string (after env var substitution).
pub fn parse_pipeline_str(yaml_str: &str) -> Result<PipelineConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: PipelineConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse pipeline YAML")?;
    Ok(config)
}

/// Parse a pipeline YAML file.
pub fn parse_pipeline(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    parse_pipeline_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LOGPIPE_TEST_BROKERS", "kafka-1:9092");
        let result = substitute_env_vars("kafka.brokers: ${LOGPIPE_TEST_BROKERS}").unwrap();
        assert_eq!(result, "kafka.brokers: kafka-1:9092");
        std::env::remove_var("LOGPIPE_TEST_BROKERS");
    }

    #[test]
    fn test_missing_env_vars_all_reported() {
        let template = "${LOGPIPE_MISSING_X} ${LOGPIPE_MISSING_Y} ${LOGPIPE_MISSING_X}";
        let err = substitute_env_vars(template).unwrap_err().to_string();
        assert_eq!(
            err,
            "Missing environment variable(s): LOGPIPE_MISSING_X, LOGPIPE_MISSING_Y"
        );
    }

    #[test]
    fn test_field_placeholders_are_kept() {
        let input = "origin: ${host}/${ path }";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "name: main\nstreams: []";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_parse_pipeline_from_string() {
        std::env::set_var("LOGPIPE_TEST_OUTPUT", "events");
        let yaml = r#"
version: 1
documentation: access log pipeline
engine:
  name: main
  configuration:
    batch.interval: 500ms
    topics.default.partitions: 2
    topics.auto.create: true
  streams:
    - name: access_logs
      configuration:
        input.topics: raw_logs
        output.topics: ${LOGPIPE_TEST_OUTPUT}
        error.topics: [errors, dead_letters]
      processors:
        - name: parser
          component: JsonEventParser
          configuration:
            replace.dots: true
        - name: dedup
          component: SelectDistinctRecords
          configuration:
            filtering.field: request_id
"#;
        let config = parse_pipeline_str(yaml).unwrap();
        std::env::remove_var("LOGPIPE_TEST_OUTPUT");

        assert_eq!(config.version, Some(1));
        let engine = &config.engine;
        assert_eq!(engine.name, "main");
        assert_eq!(engine.configuration["topics.default.partitions"], "2");
        assert_eq!(engine.configuration["topics.auto.create"], "true");

        let stream = &engine.streams[0];
        assert_eq!(stream.configuration["output.topics"], "events");
        assert_eq!(stream.configuration["error.topics"], "errors,dead_letters");
        assert_eq!(stream.processors.len(), 2);
        assert_eq!(stream.processors[0].component, "JsonEventParser");
        assert_eq!(stream.processors[0].configuration["replace.dots"], "true");
    }

    #[test]
    fn test_parse_pipeline_missing_file() {
        let err = parse_pipeline(Path::new("/nonexistent/pipeline.yml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read pipeline file"));
    }

    #[test]
    fn test_parse_pipeline_invalid_yaml() {
        let err = parse_pipeline_str("engine: [").unwrap_err();
        assert!(err.to_string().contains("Failed to parse pipeline YAML"));
    }
}
