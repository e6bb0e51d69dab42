//! Execution context handed to components.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logpipe_record::Record;
use logpipe_state::StateManager;

use crate::error::{ProcessorError, Result};
use crate::expression::{contains_expression, evaluate};
use crate::property::{PropertyDescriptor, PropertyValue};

struct ContextInner {
    identifier: String,
    component_type: String,
    descriptors: Vec<PropertyDescriptor>,
    dynamic: Vec<PropertyDescriptor>,
    properties: HashMap<String, String>,
}

/// Properties, state and back-off signal of one stage.
///
/// Cloning is cheap; per-task copies made with [`for_worker`](Self::for_worker)
/// share configuration but get their own state worker and yield flag.
#[derive(Clone)]
pub struct ProcessContext {
    inner: Arc<ContextInner>,
    state: Option<StateManager>,
    yielded: Arc<AtomicBool>,
}

impl ProcessContext {
    pub fn new(
        identifier: impl Into<String>,
        component_type: impl Into<String>,
        descriptors: Vec<PropertyDescriptor>,
        dynamic: Vec<PropertyDescriptor>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                identifier: identifier.into(),
                component_type: component_type.into(),
                descriptors,
                dynamic,
                properties,
            }),
            state: None,
            yielded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    /// Unique stage identity, also the state component id.
    pub fn identifier(&self) -> &str {
        &self.inner.identifier
    }

    pub fn component_type(&self) -> &str {
        &self.inner.component_type
    }

    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.inner
            .descriptors
            .iter()
            .chain(self.inner.dynamic.iter())
            .find(|d| d.name() == name)
    }

    /// Configured value, else the descriptor default.
    pub fn property(&self, name: &str) -> PropertyValue {
        let configured = self.inner.properties.get(name).cloned();
        let value = configured.or_else(|| {
            self.descriptor(name)
                .and_then(|d| d.get_default())
                .map(str::to_string)
        });
        PropertyValue::new(value)
    }

    /// Dynamic properties as `(name, raw value)`, sorted by name.
    pub fn dynamic_properties(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .inner
            .dynamic
            .iter()
            .filter_map(|d| {
                self.inner
                    .properties
                    .get(d.name())
                    .map(|v| (d.name().to_string(), v.clone()))
            })
            .collect();
        out.sort();
        out
    }

    /// Resolve a property against `record` and re-validate the result.
    pub fn evaluate(&self, name: &str, record: &Record) -> Result<PropertyValue> {
        let raw = self.property(name);
        let Some(template) = raw.as_str() else {
            return Ok(raw);
        };
        if !contains_expression(template) {
            return Ok(raw);
        }

        let resolved = evaluate(template, record).map_err(|message| ProcessorError::Expression {
            property: name.to_string(),
            message,
        })?;

        if let Some(descriptor) = self.descriptor(name) {
            let result = descriptor.validate_resolved(&resolved);
            if !result.valid {
                return Err(ProcessorError::InvalidProperty {
                    property: name.to_string(),
                    explanation: result.explanation,
                });
            }
        }
        Ok(PropertyValue::new(Some(resolved)))
    }

    pub fn state(&self) -> Option<&StateManager> {
        self.state.as_ref()
    }

    /// Copy bound to another worker, with a fresh yield flag.
    pub fn for_worker(&self, worker: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: self.state.as_ref().map(|s| s.for_worker(worker)),
            yielded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Tell the scheduler there was nothing to do; not an error.
    pub fn yield_now(&self) {
        self.yielded.store(true, Ordering::SeqCst);
    }

    pub fn has_yielded(&self) -> bool {
        self.yielded.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("identifier", &self.inner.identifier)
            .field("component_type", &self.inner.component_type)
            .field("state", &self.state)
            .finish()
    }
}
