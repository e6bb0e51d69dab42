use anyhow::Context;
use async_trait::async_trait;
use logpipe_record::{ErrorKind, FieldType, Record};

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators;

/// Converts fields to the type named by a dynamic property per field.
///
/// A value that cannot be converted stays as it was and the record gets a
/// type conversion error.
#[derive(Debug, Default)]
pub struct ConvertFieldsType;

impl ConfigurableComponent for ConvertFieldsType {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        Vec::new()
    }

    fn dynamic_property(&self, name: &str) -> Option<PropertyDescriptor> {
        Some(
            PropertyDescriptor::new(name)
                .description("Target type of the field")
                .dynamic()
                .validator(validators::field_type()),
        )
    }
}

#[async_trait]
impl Processor for ConvertFieldsType {
    async fn process(
        &self,
        ctx: &ProcessContext,
        mut records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let mut conversions = Vec::new();
        for (field, type_name) in ctx.dynamic_properties() {
            let target: FieldType = type_name
                .parse()
                .with_context(|| format!("Invalid target type for '{field}'"))?;
            conversions.push((field, target));
        }

        for record in &mut records {
            for (field, target) in &conversions {
                let Some(value) = record.get(field) else {
                    continue;
                };
                let converted = value.convert(*target);
                let applied = converted.and_then(|v| record.set_field(field.as_str(), *target, v));
                if let Err(e) = applied {
                    record.add_error(
                        ErrorKind::TypeConversion,
                        format!("Field '{field}': {e}"),
                    );
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRunner;
    use logpipe_record::FieldValue;

    #[tokio::test]
    async fn test_converts_and_flags_failures() {
        let stage = TestRunner::new("ConvertFieldsType")
            .set_property("status", "int")
            .set_property("bytes", "long")
            .set_property("ratio", "double")
            .build()
            .await
            .unwrap();

        let mut good = Record::new("access");
        good.set("status", "200");
        good.set("bytes", "5000000000");
        good.set("ratio", "0.25");

        let mut bad = Record::new("access");
        bad.set("status", "oops");

        let out = stage
            .process(stage.context(), vec![good, bad])
            .await
            .unwrap();

        assert_eq!(out[0].get("status"), Some(&FieldValue::Int(200)));
        assert_eq!(out[0].get("bytes"), Some(&FieldValue::Long(5_000_000_000)));
        assert_eq!(out[0].get("ratio"), Some(&FieldValue::Double(0.25)));
        assert!(!out[0].has_errors());

        assert_eq!(out[1].get_str("status"), Some("oops"));
        assert_eq!(out[1].errors().len(), 1);
        assert_eq!(out[1].errors()[0].kind, ErrorKind::TypeConversion);
    }

    #[tokio::test]
    async fn test_unknown_type_fails_validation() {
        let err = TestRunner::new("ConvertFieldsType")
            .set_property("status", "decimal")
            .build()
            .await
            .unwrap_err();
        assert_eq!(err.explanations()[0].0, "status");
    }
}
