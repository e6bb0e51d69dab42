use async_trait::async_trait;
use logpipe_record::{ConflictPolicy, ErrorKind, Field, Record};

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;

pub const CONFLICT_RESOLUTION_POLICY: &str = "conflict.resolution.policy";

pub(crate) fn conflict_policy_property() -> PropertyDescriptor {
    PropertyDescriptor::new(CONFLICT_RESOLUTION_POLICY)
        .description("What to do when a field with the same name already exists")
        .allowable_values(ConflictPolicy::ALLOWABLE_VALUES)
        .default_value(ConflictPolicy::KeepOldField.as_str())
}

pub(crate) fn conflict_policy(ctx: &ProcessContext) -> anyhow::Result<ConflictPolicy> {
    let raw = ctx
        .property(CONFLICT_RESOLUTION_POLICY)
        .as_string()
        .unwrap_or_default();
    Ok(raw.parse::<ConflictPolicy>()?)
}

/// Adds one field per dynamic property; values may use `${field}`.
#[derive(Debug, Default)]
pub struct AddFields;

impl ConfigurableComponent for AddFields {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![conflict_policy_property()]
    }

    fn dynamic_property(&self, name: &str) -> Option<PropertyDescriptor> {
        Some(
            PropertyDescriptor::new(name)
                .description("Value of the field to add")
                .dynamic()
                .supports_expression(),
        )
    }
}

#[async_trait]
impl Processor for AddFields {
    async fn process(
        &self,
        ctx: &ProcessContext,
        mut records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let policy = conflict_policy(ctx)?;
        let additions = ctx.dynamic_properties();

        for record in &mut records {
            for (name, _) in &additions {
                match ctx.evaluate(name, record) {
                    Ok(value) => {
                        let value = value.as_string().unwrap_or_default();
                        record.merge_field(Field::of(name.as_str(), value), policy);
                    }
                    Err(e) => record.add_error(ErrorKind::Expression, e.to_string()),
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

    #[tokio::test]
    async fn test_adds_literal_and_expression_fields() {
        let stage = TestRunner::new("AddFields")
            .set_property("env", "prod")
            .set_property("route", "${method} ${path}")
            .build()
            .await
            .unwrap();

        let mut record = Record::new("access");
        record.set("method", "GET");
        record.set("path", "/index");
        let out = stage.process(stage.context(), vec![record]).await.unwrap();

        assert_eq!(out[0].get_str("env"), Some("prod"));
        assert_eq!(out[0].get_str("route"), Some("GET /index"));
        assert!(!out[0].has_errors());
    }

    #[tokio::test]
    async fn test_conflict_policy() {
        let mut existing = Record::new("t");
        existing.set("env", "dev");

        let keep = TestRunner::new("AddFields")
            .set_property("env", "prod")
            .build()
            .await
            .unwrap();
        let out = keep.process(keep.context(), vec![existing.clone()]).await.unwrap();
        assert_eq!(out[0].get_str("env"), Some("dev"));

        let overwrite = TestRunner::new("AddFields")
            .set_property("env", "prod")
            .set_property(CONFLICT_RESOLUTION_POLICY, "overwrite_existing")
            .build()
            .await
            .unwrap();
        let out = overwrite
            .process(overwrite.context(), vec![existing])
            .await
            .unwrap();
        assert_eq!(out[0].get_str("env"), Some("prod"));
    }

    #[tokio::test]
    async fn test_unresolved_expression_becomes_record_error() {
        let stage = TestRunner::new("AddFields")
            .set_property("route", "${path}")
            .build()
            .await
            .unwrap();
        let out = stage
            .process(stage.context(), vec![Record::new("t"), {
                let mut r = Record::new("t");
                r.set("path", "/ok");
                r
            }])
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out[0].has_errors());
        assert_eq!(out[0].errors()[0].kind, ErrorKind::Expression);
        assert!(!out[0].has_field("route"));
        assert_eq!(out[1].get_str("route"), Some("/ok"));
    }

    #[tokio::test]
    async fn test_invalid_policy_fails_validation() {
        let err = TestRunner::new("AddFields")
            .set_property(CONFLICT_RESOLUTION_POLICY, "sum")
            .build()
            .await
            .unwrap_err();
        assert_eq!(err.explanations()[0].0, CONFLICT_RESOLUTION_POLICY);
    }
}
