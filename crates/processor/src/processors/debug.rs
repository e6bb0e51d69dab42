use async_trait::async_trait;
use logpipe_record::Record;
use tracing::{debug, info};

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;

pub const LOG_LEVEL: &str = "log.level";

/// Logs every record as JSON and passes it on unchanged.
#[derive(Debug, Default)]
pub struct DebugRecords;

impl ConfigurableComponent for DebugRecords {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![PropertyDescriptor::new(LOG_LEVEL)
            .description("Level the records are logged at")
            .allowable_values(["debug", "info"])
            .default_value("debug")]
    }
}

#[async_trait]
impl Processor for DebugRecords {
    async fn process(
        &self,
        ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let at_info = ctx
            .property(LOG_LEVEL)
            .as_str()
            .is_some_and(|level| level.eq_ignore_ascii_case("info"));

        for record in &records {
            let json = record.to_json();
            if at_info {
                info!("[{}] {}", ctx.identifier(), json);
            } else {
                debug!("[{}] {}", ctx.identifier(), json);
            }
        }
        Ok(records)
    }
}
