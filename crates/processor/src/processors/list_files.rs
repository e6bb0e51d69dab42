use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logpipe_record::Record;
use logpipe_state::Scope;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::component::{ConfigurableComponent, Processor};
use crate::context::ProcessContext;
use crate::listing::{
    BucketListingCursor, DirectoryLister, ListedObject, ObjectLister, WatermarkListing,
};
use crate::property::PropertyDescriptor;
use crate::validators::{self, ValidationResult};

pub const DIRECTORY: &str = "directory";
pub const PREFIX: &str = "prefix";
pub const RECURSIVE: &str = "recursive";
pub const MAX_DEPTH: &str = "max.depth";
pub const MIN_AGE: &str = "min.age";
pub const PAGE_SIZE: &str = "page.size";
pub const RECORD_TYPE: &str = "record.type";

/// Source stage listing new files of a directory on every cycle.
///
/// The listing cursor lives in CLUSTER state so that every instance of the
/// stage resumes where the last one stopped.
#[derive(Default)]
pub struct ListFiles {
    lister: Option<Arc<dyn ObjectLister>>,
    cached: Mutex<Option<WatermarkListing>>,
}

impl ListFiles {
    /// Use `lister` instead of walking `directory`.
    pub fn with_lister(lister: Arc<dyn ObjectLister>) -> Self {
        Self {
            lister: Some(lister),
            cached: Mutex::new(None),
        }
    }

    fn to_record(object: &ListedObject, directory: &str, record_type: &str) -> Record {
        let mut record = Record::new(record_type);
        let parent = Path::new(directory)
            .join(&object.key)
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| directory.to_string());

        record.set("key", object.key.as_str());
        record.set("directory", parent);
        record.set("last_modified", object.last_modified);
        record.set("size", i64::try_from(object.size).unwrap_or(i64::MAX));
        if let Some(time) = DateTime::<Utc>::from_timestamp_millis(object.last_modified) {
            record.set_time(time);
        }
        record
    }

    /// Listing to run this cycle: stored cursor first, cached one if the
    /// store cannot be read, `None` when there is nothing to resume from.
    async fn load_listing(&self, ctx: &ProcessContext) -> Option<WatermarkListing> {
        let cached = self.cached.lock().await.clone();
        let Some(state) = ctx.state() else {
            return Some(cached.unwrap_or_default());
        };
        match state.get_state(Scope::Cluster).await {
            Ok(map) => Some(WatermarkListing::resume(BucketListingCursor::from_state(&map))),
            Err(e) => {
                warn!(
                    "Failed to load listing state for {}: {}; using cached cursor",
                    ctx.identifier(),
                    e
                );
                cached
            }
        }
    }
}

impl ConfigurableComponent for ListFiles {
    fn properties(&self) -> Vec<PropertyDescriptor> {
        vec![
            PropertyDescriptor::new(DIRECTORY)
                .description("Directory to list")
                .required(true)
                .validator(validators::non_empty()),
            PropertyDescriptor::new(PREFIX)
                .description("Only list keys starting with this prefix"),
            PropertyDescriptor::new(RECURSIVE)
                .description("Descend into sub-directories")
                .default_value("false")
                .validator(validators::boolean()),
            PropertyDescriptor::new(MAX_DEPTH)
                .description("How many levels to descend when recursive")
                .validator(validators::positive_integer()),
            PropertyDescriptor::new(MIN_AGE)
                .description("Skip files modified more recently than this")
                .default_value("0 sec")
                .validator(validators::time_period()),
            PropertyDescriptor::new(PAGE_SIZE)
                .description("Number of keys fetched per listing page")
                .default_value("1000")
                .validator(validators::positive_integer()),
            PropertyDescriptor::new(RECORD_TYPE)
                .description("Type of the emitted records")
                .default_value("file")
                .validator(validators::non_empty()),
        ]
    }

    fn custom_validate(&self, ctx: &ProcessContext) -> Vec<ValidationResult> {
        let recursive = ctx.property(RECURSIVE).as_bool().unwrap_or(false);
        if ctx.property(MAX_DEPTH).is_set() && !recursive {
            return vec![ValidationResult::invalid(
                MAX_DEPTH,
                ctx.property(MAX_DEPTH).as_str(),
                "'max.depth' cannot be used when 'recursive' is false",
            )];
        }
        Vec::new()
    }
}

#[async_trait]
impl Processor for ListFiles {
    async fn init(&mut self, ctx: &ProcessContext) -> anyhow::Result<()> {
        if self.lister.is_some() {
            return Ok(());
        }
        let directory = ctx
            .property(DIRECTORY)
            .as_string()
            .context("directory is not set")?;
        let lister = DirectoryLister::new(directory)
            .prefix(ctx.property(PREFIX).as_string())
            .recursive(
                ctx.property(RECURSIVE).as_bool().unwrap_or(false),
                ctx.property(MAX_DEPTH).as_usize(),
            )
            .page_size(ctx.property(PAGE_SIZE).as_usize().unwrap_or(1000));
        self.lister = Some(Arc::new(lister));
        Ok(())
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        mut records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>> {
        let lister = self
            .lister
            .as_ref()
            .context("ListFiles used before initialization")?;
        let directory = ctx.property(DIRECTORY).as_string().unwrap_or_default();
        let record_type = ctx
            .property(RECORD_TYPE)
            .as_string()
            .unwrap_or_else(|| "file".to_string());
        let min_age = ctx.property(MIN_AGE).as_duration().unwrap_or(Duration::ZERO);

        let Some(mut listing) = self.load_listing(ctx).await else {
            ctx.yield_now();
            return Ok(records);
        };

        let cycle_start = Utc::now().timestamp_millis();
        let emitted = listing
            .run_cycle(lister.as_ref(), cycle_start, min_age)
            .await
            .with_context(|| format!("Listing failed for {}", ctx.identifier()))?;

        if emitted.is_empty() {
            debug!("No new files for {}", ctx.identifier());
            *self.cached.lock().await = Some(listing);
            ctx.yield_now();
            return Ok(records);
        }

        if let Some(state) = ctx.state() {
            let entries = listing.cursor().to_state_entries();
            if let Err(e) = state.set_state(entries, Scope::Cluster).await {
                warn!(
                    "Failed to persist listing state for {}: {}; keeping cursor in memory",
                    ctx.identifier(),
                    e
                );
            }
        }

        info!(
            "Listed {} new file(s) for {}, watermark now {}",
            emitted.len(),
            ctx.identifier(),
            listing.cursor().watermark()
        );
        records.extend(
            emitted
                .iter()
                .map(|object| Self::to_record(object, &directory, &record_type)),
        );
        *self.cached.lock().await = Some(listing);
        Ok(records)
    }
}
