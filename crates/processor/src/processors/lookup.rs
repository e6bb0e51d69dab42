use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use logpipe_record::{ErrorKind, Field, FieldValue, Record};
use tracing::info;

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators;

use super::add_fields::{conflict_policy, conflict_policy_property};

pub const LOOKUP_FILE: &str = "lookup.file";
pub const LOOKUP_KEY: &str = "lookup.key";
pub const RESPONSE_FIELD: &str = "response.field";
pub const IGNORE_MISSING: &str = "ignore.missing";

/// Record type of the nested record written under `response.field`.
pub const LOOKUP_RESPONSE_TYPE: &str = "lookup_response";

/// Enriches records from a static JSON table.
///
/// The table is a JSON object mapping each key to an object of fields.
/// Matched fields are merged at top level, or nested as one RECORD field
/// when `response.field` is set.
#[derive(Debug, Default)]
pub struct LookupRecords {
    table: HashMap<String, Vec<Field>>,
}

impl LookupRecords {
    /// Build the table from a parsed JSON document.
    pub fn load_table(document: &serde_json::Value) -> anyhow::Result<HashMap<String, Vec<Field>>> {
        let entries = document
            .as_object()
            .context("Lookup table must be a JSON object")?;

        let mut table = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let object = value
                .as_object()
                .with_context(|| format!("Lookup entry '{key}' must be a JSON object"))?;
            let fields = object
                .iter()
                .filter_map(|(name, v)| {
                    FieldValue::from_json(v).map(|v| Field::of(name.as_str(), v))
                })
                .collect();
            table.insert(key.clone(), fields);
        }
        Ok(table)
    }
}

impl ConfigurableComponent for LookupRecords {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(LOOKUP_FILE)
                .description("JSON file holding the lookup table")
                .required(true)
                .validator(validators::file_exists()),
            PropertyDescriptor::new(LOOKUP_KEY)
                .description("Key to look up, usually an expression like ${user_id}")
                .required(true)
                .supports_expression()
                .validator(validators::non_empty()),
            PropertyDescriptor::new(RESPONSE_FIELD)
                .description("Nest the matched fields under this RECORD field")
                .validator(validators::non_empty()),
            conflict_policy_property(),
            PropertyDescriptor::new(IGNORE_MISSING)
                .description("Leave records without a table entry untouched")
                .default_value("true")
                .validator(validators::boolean()),
        ]
    }
}

#[async_trait]
impl Processor for LookupRecords {
    async fn init(&mut self, ctx: &ProcessContext) -> anyhow::Result<()> {
        let path = ctx
            .property(LOOKUP_FILE)
            .as_string()
            .context("lookup.file is not set")?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read lookup file: {path}"))?;
        let document: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse lookup file: {path}"))?;
        self.table = Self::load_table(&document)?;
        info!("Loaded {} lookup entries from {}", self.table.len(), path);
        Ok(())
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        mut records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let policy = conflict_policy(ctx)?;
        let response_field = ctx.property(RESPONSE_FIELD).as_string();
        let ignore_missing = ctx.property(IGNORE_MISSING).as_bool().unwrap_or(true);

        for record in &mut records {
            let key = match ctx.evaluate(LOOKUP_KEY, record) {
                Ok(value) => value.as_string().unwrap_or_default(),
                Err(e) => {
                    record.add_error(ErrorKind::Expression, e.to_string());
                    continue;
                }
            };

            let Some(fields) = self.table.get(&key) else {
                if !ignore_missing {
                    record.add_error(ErrorKind::Lookup, format!("No lookup entry for key '{key}'"));
                }
                continue;
            };

            match &response_field {
                Some(name) => {
                    let mut response = Record::with_id(key.as_str(), LOOKUP_RESPONSE_TYPE);
                    for field in fields {
                        response.put(field.clone());
                    }
                    record.merge_field(Field::of(name.as_str(), response), policy);
                }
                None => {
                    record.merge_fields(fields.iter().cloned(), policy);
                }
            }
        }
        Ok(records)
    }
}
