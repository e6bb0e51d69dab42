//! Static component registry: type name to constructor.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::component::{Component, Parser, Processor};
use crate::error::{ProcessorError, Result};
use crate::parsers::{JsonEventParser, RawLineParser};
use crate::processors::{
    AddFields, ConvertFieldsType, DebugRecords, ListFiles, LookupRecords, SelectDistinctRecords,
};
use crate::property::PropertyDescriptor;

type Factory = Arc<dyn Fn() -> Component + Send + Sync>;

/// Summary of a registered component, for listings.
#[derive(Debug, Clone)]
pub struct ComponentDescription {
    pub name: String,
    pub kind: &'static str,
    pub properties: Vec<PropertyDescriptor>,
}

/// Maps component type names to constructors.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in component.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_parser("RawLineParser", RawLineParser::default);
        registry.register_parser("JsonEventParser", JsonEventParser::default);
        registry.register_processor("SelectDistinctRecords", SelectDistinctRecords::default);
        registry.register_processor("AddFields", AddFields::default);
        registry.register_processor("ConvertFieldsType", ConvertFieldsType::default);
        registry.register_processor("LookupRecords", LookupRecords::default);
        registry.register_processor("ListFiles", ListFiles::default);
        registry.register_processor("DebugRecords", DebugRecords::default);
        registry
    }

    pub fn register_processor<P, F>(&mut self, name: impl Into<String>, factory: F)
    where
        P: Processor + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move || Component::Processor(Box::new(factory()))),
        );
    }

    pub fn register_parser<P, F>(&mut self, name: impl Into<String>, factory: F)
    where
        P: Parser + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move || Component::Parser(Box::new(factory()))),
        );
    }

    pub fn create(&self, name: &str) -> Result<Component> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ProcessorError::UnknownComponent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn component_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn describe(&self, name: &str) -> Option<ComponentDescription> {
        let factory = self.factories.get(name)?;
        let component = factory();
        Some(ComponentDescription {
            name: name.to_string(),
            kind: component.kind(),
            properties: component.properties(),
        })
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.component_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_contents() {
        let registry = ComponentRegistry::standard();
        assert_eq!(
            registry.component_types(),
            vec![
                "AddFields",
                "ConvertFieldsType",
                "DebugRecords",
                "JsonEventParser",
                "ListFiles",
                "LookupRecords",
                "RawLineParser",
                "SelectDistinctRecords",
            ]
        );
    }

    #[test]
    fn test_unknown_component() {
        let registry = ComponentRegistry::standard();
        assert!(matches!(
            registry.create("Nope"),
            Err(ProcessorError::UnknownComponent(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_describe() {
        let registry = ComponentRegistry::standard();
        let description = registry.describe("SelectDistinctRecords").unwrap();
        assert_eq!(description.kind, "processor");
        assert!(description
            .properties
            .iter()
            .any(|p| p.name() == "filtering.field"));
        assert_eq!(registry.describe("RawLineParser").unwrap().kind, "parser");
        assert!(registry.describe("Nope").is_none());
    }
}
