//! DQM archive replay CLI
//!
//! - Replay archive segments and print the boundaries and merged elements
//! - Inspect the index of one archive
//! - Generate a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dqm_archive::archive::{FileOpener, SegmentOpener};
use dqm_archive::config::{generate_default_config, Config, LoggingConfig};
use dqm_archive::element::{DqmStore, MonitorElement, Payload};
use dqm_archive::source::index::load_index;
use dqm_archive::{DqmArchiveSource, Replay, TraversalOrder};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dqm-replay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay monitoring-data archives run by run and lumi by lumi")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay archive segments in order
    Replay {
        /// Segment locations; overrides the configured list
        files: Vec<String>,
    },

    /// Show the index of one archive in traversal order
    Index {
        /// Archive location
        file: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    if cli.format != "table" && cli.format != "json" {
        bail!("Unknown output format '{}' (expected table or json)", cli.format);
    }
    let json = cli.format == "json";

    match cli.command {
        Commands::Replay { files } => {
            let files = if files.is_empty() {
                config.source.file_names
            } else {
                files
            };
            if files.is_empty() {
                bail!("No archive segments given; pass files or set [source] file_names");
            }

            tracing::info!("DQM archive replay v{}", env!("CARGO_PKG_VERSION"));
            let mut source = DqmArchiveSource::new(files, FileOpener);
            let mut store = DqmStore::new();
            let mut replay = Replay::new();
            replay
                .run(&mut source, &mut store)
                .context("Replay failed")?;

            if json {
                let report = serde_json::json!({
                    "transitions": replay.transitions(),
                    "stats": source.stats(),
                    "elements": store.iter().collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Boundaries:");
                for transition in replay.boundaries() {
                    println!("  {:?}", transition);
                }
                println!();
                println!("{:<50} {:<11} {:<5} {}", "Element", "Kind", "Lumi", "Value");
                println!("{}", "-".repeat(90));
                for element in store.iter() {
                    println!(
                        "{:<50} {:<11} {:<5} {}",
                        element.full_name(),
                        element.kind(),
                        if element.is_lumi() { "yes" } else { "-" },
                        summarize(element)
                    );
                }
                println!();
                println!("{}", source.stats());
            }
        }

        Commands::Index { file } => {
            let mut container = FileOpener
                .open(&file)
                .with_context(|| format!("Failed to open {}", file))?;
            let records = load_index(container.as_mut())?;
            let order = TraversalOrder::build(&records);

            if json {
                let rows: Vec<_> = order
                    .iter()
                    .map(|raw| serde_json::json!({ "raw": raw, "record": records[raw] }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!(
                    "{:<6} {:<8} {:<8} {:<11} {}",
                    "Raw", "Run", "Lumi", "Kind", "Rows"
                );
                println!("{}", "-".repeat(50));
                for raw in order.iter() {
                    let record = &records[raw];
                    println!(
                        "{:<6} {:<8} {:<8} {:<11} {}..={}",
                        raw,
                        record.run,
                        record.lumi,
                        record.type_tag,
                        record.first_row,
                        record.last_row
                    );
                }
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "dqm_archive={level},dqm_replay={level},merge_failure=error",
            level = logging.level
        )
        .into()
    });

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path))?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let (pretty, json) = if logging.format == "json" {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(writer)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(writer)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
    Ok(())
}

fn summarize(element: &MonitorElement) -> String {
    match element.payload() {
        Payload::Int(v) => v.to_string(),
        Payload::Float(v) => v.to_string(),
        Payload::String(s) => format!("{:?}", s),
        _ => match element.histogram() {
            Some(h) => format!("{} entries, sum {}", h.entries, h.sum()),
            None => "-".to_string(),
        },
    }
}
