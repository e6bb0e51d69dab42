use std::collections::HashMap;

use async_trait::async_trait;
use logpipe_record::{FieldValue, Record};

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators;

pub const FILTERING_FIELD: &str = "filtering.field";

/// Keeps the first record of each distinct value of a field.
///
/// Distinctness holds within one partition batch and compares type and
/// value, so `1` and `"1"` are different. Records without the field pass
/// through.
#[derive(Debug, Default)]
pub struct SelectDistinctRecords;

impl ConfigurableComponent for SelectDistinctRecords {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::new(FILTERING_FIELD)
            .description("Field whose value identifies duplicates")
            .required(true)
            .validator(validators::non_empty())]
    }
}

#[async_trait]
impl Processor for SelectDistinctRecords {
    async fn process(
        &self,
        ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let Some(field) = ctx.property(FILTERING_FIELD).as_string() else {
            return Ok(records);
        };

        // Values bucketed by their canonical JSON text, compared exactly inside a bucket
        let mut seen: HashMap<String, Vec<FieldValue>> = HashMap::new();
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if let Some(value) = record.get(&field) {
                let bucket = seen.entry(value.to_json().to_string()).or_default();
                if bucket.contains(value) {
                    continue;
                }
                bucket.push(value.clone());
            }
            kept.push(record);
        }
        Ok(kept)
    }
}
