//! The processor and parser contracts.

use async_trait::async_trait;
use logpipe_record::Record;

use crate::context::ProcessContext;
use crate::property::PropertyDescriptor;
use crate::validators::ValidationResult;

/// Anything that declares properties and can be validated at build time.
pub trait ConfigurableComponent: Send + Sync {
    fn properties(&self) -> Vec<PropertyDescriptor>;

    /// Descriptor for a property not listed in [`properties`](Self::properties),
    /// or `None` if such properties are not supported.
    fn dynamic_property(&self, _name: &str) -> Option<PropertyDescriptor> {
        None
    }

    /// Cross-property checks, run after every property passed on its own.
    fn custom_validate(&self, _ctx: &ProcessContext) -> Vec<ValidationResult> {
        Vec::new()
    }
}

/// Transforms a partition's records.
///
/// Per-record failures go into the record's error list. An `Err` fails the
/// whole partition task and counts against the retry budget.
#[async_trait]
pub trait Processor: ConfigurableComponent {
    /// Called once when the pipeline is built.
    async fn init(&mut self, _ctx: &ProcessContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        records: Vec<Record>,
    ) -> anyhow::Result<Vec<Record>>;
}

/// Turns one raw transport message into zero or more records.
#[async_trait]
pub trait Parser: ConfigurableComponent {
    async fn init(&mut self, _ctx: &ProcessContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn parse(
        &self,
        ctx: &ProcessContext,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> anyhow::Result<Vec<Record>>;
}

/// A registry-built component of either kind.
pub enum Component {
    Processor(Box<dyn Processor>),
    Parser(Box<dyn Parser>),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Processor(_) => "processor",
            Component::Parser(_) => "parser",
        }
    }

    pub fn properties(&self) -> Vec<PropertyDescriptor> {
        match self {
            Component::Processor(p) => p.properties(),
            Component::Parser(p) => p.properties(),
        }
    }

    pub fn dynamic_property(&self, name: &str) -> Option<PropertyDescriptor> {
        match self {
            Component::Processor(p) => p.dynamic_property(name),
            Component::Parser(p) => p.dynamic_property(name),
        }
    }

    pub fn custom_validate(&self, ctx: &ProcessContext) -> Vec<ValidationResult> {
        match self {
            Component::Processor(p) => p.custom_validate(ctx),
            Component::Parser(p) => p.custom_validate(ctx),
        }
    }

    pub async fn init(&mut self, ctx: &ProcessContext) -> anyhow::Result<()> {
        match self {
            Component::Processor(p) => p.init(ctx).await,
            Component::Parser(p) => p.init(ctx).await,
        }
    }
}
