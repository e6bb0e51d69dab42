//! Command-line interface for logpipe
//!
//! # Usage Examples
//!
//! ```bash
//! # Run in-process, seeding the raw topic from a log file, for 30 seconds
//! logpipe run --config pipeline.yml --seed raw_logs=access.log --timeout 30s
//!
//! # Run against Kafka (built with --features kafka)
//! logpipe run --config pipeline.yml --mode cluster
//!
//! # Check a pipeline without running it
//! logpipe validate --config pipeline.yml
//!
//! # List the available components and their properties
//! logpipe components
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use logpipe::config::settings::{engine_properties, stream_properties, TIMEOUT};
use logpipe::config::{parse_pipeline, EngineSettings, PipelineConfig};
use logpipe::{Engine, EngineError, MemoryTransport, Shutdown};
use logpipe_processor::{parse_duration, ComponentRegistry, PropertyDescriptor};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "logpipe")]
#[command(about = "A partitioned micro-batch pipeline for log and event records")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the pipeline and run it until the timeout or Ctrl-C
    Run {
        /// Pipeline document
        #[arg(long, env = "LOGPIPE_CONFIG")]
        config: PathBuf,

        /// Where topics live
        #[arg(long, value_enum, default_value = "standalone", env = "LOGPIPE_MODE")]
        mode: Mode,

        /// Seed a topic from a newline-delimited file (standalone only)
        #[arg(long = "seed", value_name = "TOPIC=PATH")]
        seeds: Vec<String>,

        /// Stop after this period, overrides the engine's timeout property
        /// Format: "30s", "5 min", "1h" or plain seconds
        #[arg(long)]
        timeout: Option<String>,
    },

    /// Validate a pipeline document and list every problem found
    Validate {
        /// Pipeline document
        #[arg(long, env = "LOGPIPE_CONFIG")]
        config: PathBuf,
    },

    /// List registered components and their properties
    Components,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// In-process topics
    Standalone,
    /// Kafka topics
    Cluster,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            mode,
            seeds,
            timeout,
        } => {
            let mut pipeline = parse_pipeline(&config)?;
            if let Some(timeout) = timeout {
                parse_duration(&timeout)
                    .with_context(|| format!("Invalid --timeout '{timeout}'"))?;
                pipeline
                    .engine
                    .configuration
                    .insert(TIMEOUT.to_string(), timeout);
            }
            let registry = ComponentRegistry::standard();
            match mode {
                Mode::Standalone => run_standalone(&pipeline, &registry, &seeds).await?,
                Mode::Cluster => {
                    if !seeds.is_empty() {
                        warn!("--seed is ignored in cluster mode");
                    }
                    run_cluster(&pipeline, &registry).await?
                }
            }
        }
        Commands::Validate { config } => {
            let pipeline = parse_pipeline(&config)?;
            let transport = Arc::new(MemoryTransport::new());
            match Engine::build(&pipeline, &ComponentRegistry::standard(), transport).await {
                Ok(engine) => {
                    println!(
                        "Pipeline '{}' is valid: {} stream(s)",
                        engine.name(),
                        engine.streams().len()
                    );
                }
                Err(EngineError::Configuration(problems)) => {
                    for problem in &problems.problems {
                        println!("{problem}");
                    }
                    anyhow::bail!(
                        "{} configuration problem(s) in {}",
                        problems.problems.len(),
                        config.display()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Components => {
            let registry = ComponentRegistry::standard();
            print_properties("Engine", "engine", &engine_properties());
            print_properties("Stream", "stream", &stream_properties());
            for name in registry.component_types() {
                if let Some(description) = registry.describe(name) {
                    print_properties(&description.name, description.kind, &description.properties);
                }
            }
        }
    }

    Ok(())
}

fn print_properties(name: &str, kind: &str, properties: &[PropertyDescriptor]) {
    println!("{name} ({kind})");
    for property in properties {
        let mut line = format!("  {}", property.name());
        if property.is_required() {
            line.push_str(" [required]");
        }
        if let Some(default) = property.get_default() {
            line.push_str(&format!(" (default: {default})"));
        }
        if let Some(allowed) = property.get_allowable_values() {
            line.push_str(&format!(" one of: {}", allowed.join(", ")));
        }
        if property.is_dynamic() {
            line.push_str(" [dynamic]");
        }
        println!("{line}");
        if !property.get_description().is_empty() {
            println!("      {}", property.get_description());
        }
    }
    println!();
}

/// Resolves on Ctrl-C; never resolves when the signal cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

fn parse_seed(seed: &str) -> anyhow::Result<(&str, &Path)> {
    match seed.split_once('=') {
        Some((topic, path)) if !topic.is_empty() && !path.is_empty() => {
            Ok((topic, Path::new(path)))
        }
        _ => anyhow::bail!("Invalid --seed '{seed}', expected TOPIC=PATH"),
    }
}

async fn run_standalone(
    pipeline: &PipelineConfig,
    registry: &ComponentRegistry,
    seeds: &[String],
) -> anyhow::Result<()> {
    let transport = Arc::new(MemoryTransport::new());
    let partitions =
        EngineSettings::from_properties(&pipeline.engine.name, &pipeline.engine.configuration)
            .map(|s| s.topics_default_partitions)
            .unwrap_or(4);
    for seed in seeds {
        let (topic, path) = parse_seed(seed)?;
        transport.seed_from_file(topic, partitions, path).await?;
    }

    let mut engine = Engine::build(pipeline, registry, transport.clone()).await?;
    let outcome = engine.run(shutdown_signal()).await;

    for (topic, count) in transport.topic_counts().await {
        println!("{topic}: {count} message(s)");
    }
    report(outcome?);
    Ok(())
}

#[cfg(feature = "kafka")]
async fn run_cluster(
    pipeline: &PipelineConfig,
    registry: &ComponentRegistry,
) -> anyhow::Result<()> {
    use logpipe::config::settings::KAFKA_BROKERS;
    use logpipe::KafkaTransport;
    use logpipe_processor::ConfigurationError;

    let engine_name = &pipeline.engine.name;
    let settings = EngineSettings::from_properties(engine_name, &pipeline.engine.configuration)
        .map_err(EngineError::Configuration)?;
    let Some(brokers) = settings.kafka_brokers else {
        let mut problems = ConfigurationError::new();
        problems.push(engine_name, KAFKA_BROKERS, "is required in cluster mode");
        return Err(EngineError::Configuration(problems).into());
    };

    let transport = Arc::new(KafkaTransport::new(&brokers)?);
    let mut engine = Engine::build(pipeline, registry, transport).await?;
    report(engine.run(shutdown_signal()).await?);
    Ok(())
}

#[cfg(not(feature = "kafka"))]
async fn run_cluster(
    _pipeline: &PipelineConfig,
    _registry: &ComponentRegistry,
) -> anyhow::Result<()> {
    Err(EngineError::KafkaUnavailable.into())
}

fn report(shutdown: Shutdown) {
    match shutdown {
        Shutdown::Timeout => info!("Engine stopped after its timeout"),
        Shutdown::Signal => info!("Engine stopped on Ctrl-C"),
    }
}
