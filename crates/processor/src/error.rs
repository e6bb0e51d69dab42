//! Error types for the processor crate.

use std::fmt;
use thiserror::Error;

/// One configuration problem found at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProblem {
    /// Engine, stream or stage the property belongs to
    pub component: String,
    pub property: String,
    pub explanation: String,
}

impl fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] '{}': {}",
            self.component, self.property, self.explanation
        )
    }
}

/// Every configuration problem of a pipeline, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationError {
    pub problems: Vec<ConfigProblem>,
}

impl ConfigurationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        component: impl Into<String>,
        property: impl Into<String>,
        explanation: impl Into<String>,
    ) {
        self.problems.push(ConfigProblem {
            component: component.into(),
            property: property.into(),
            explanation: explanation.into(),
        });
    }

    pub fn extend(&mut self, other: ConfigurationError) {
        self.problems.extend(other.problems);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// `Ok(())` when no problem was collected.
    pub fn into_result(self) -> std::result::Result<(), ConfigurationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// `(property, explanation)` pairs, in discovery order.
    pub fn explanations(&self) -> Vec<(String, String)> {
        self.problems
            .iter()
            .map(|p| (p.property.clone(), p.explanation.clone()))
            .collect()
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration problem(s)", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "\n  - {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors raised by the processor framework.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Unknown component type: {0}")]
    UnknownComponent(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Cannot evaluate '{property}': {message}")]
    Expression { property: String, message: String },

    #[error("Property '{property}' resolved to an invalid value: {explanation}")]
    InvalidProperty {
        property: String,
        explanation: String,
    },

    #[error("Stage '{stage}' is a {actual}, not a {expected}")]
    WrongStageKind {
        stage: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type alias for processor framework operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;
