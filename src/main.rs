//! provgraph CLI - ingest, query and translate provenance records

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use provgraph::config::{default_config_path, load_config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "provgraph")]
#[command(version)]
#[command(about = "Provenance graph store and CDM translator")]
#[command(long_about = r#"
provgraph ingests the OPM vertex/edge stream of an audit pipeline, enabling:
  • Persistence into a SQLite lineage store
  • Ancestor/descendant lineage queries
  • Translation to Common Data Model records

Example usage:
  provgraph ingest --input audit.jsonl --translate --endpoint cdm.jsonl
  provgraph vertices "name:bash"
  provgraph lineage --id 42 --direction ancestors --depth 5 --stop "name:init"
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./provgraph.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output mode
    #[arg(short, long, global = true, value_enum, default_value = "human")]
    output: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Ingest a JSON-lines stream of vertices and edges
    Ingest {
        /// Input file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Lineage store arguments: "driver url username password"
        #[arg(short, long)]
        database: Option<String>,

        /// Do not write to the lineage store
        #[arg(long)]
        no_store: bool,

        /// Translate records to CDM and publish them
        #[arg(short, long)]
        translate: bool,

        /// Where translated records go (- is stdout)
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Find stored vertices matching a key:value predicate
    Vertices {
        /// Predicate, e.g. "pid:100" or "path:/etc/passwd"
        predicate: String,

        /// Lineage store arguments: "driver url username password"
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Walk the lineage of a stored vertex
    Lineage {
        /// Row id (vertexId) of the start vertex
        #[arg(long)]
        id: i64,

        /// Maximum number of hops
        #[arg(long, default_value = "3")]
        depth: u32,

        /// ancestors or descendants (any prefix)
        #[arg(long, default_value = "descendants")]
        direction: String,

        /// Vertices matching this key:value predicate are not expanded
        #[arg(long)]
        stop: Option<String>,

        /// Result filters to apply (no-memory, last-name)
        #[arg(short, long)]
        filter: Vec<String>,

        /// Lineage store arguments: "driver url username password"
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Show lineage store statistics
    Stats {
        /// Lineage store arguments: "driver url username password"
        #[arg(short, long)]
        database: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputMode::Human)
    }
}

/// Print a machine-readable result envelope
pub fn emit_success(command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    let envelope = serde_json::json!({
        "ok": true,
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout may carry translated records
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(Some(config_path.as_path()))?.unwrap_or_default();
    let mode = cli.output;

    let result = match cli.command {
        Commands::Init { force } => commands::run_init(&config_path, force, mode),
        Commands::Ingest {
            input,
            database,
            no_store,
            translate,
            endpoint,
        } => {
            if let Some(arguments) = database {
                config.lineage.arguments = arguments;
            }
            if let Some(endpoint) = endpoint {
                config.translator.endpoint = endpoint;
            }
            commands::run_ingest(&config, &input, !no_store, translate, mode)
        }
        Commands::Vertices { predicate, database } => {
            if let Some(arguments) = database {
                config.lineage.arguments = arguments;
            }
            commands::run_vertices(&config, &predicate, mode)
        }
        Commands::Lineage {
            id,
            depth,
            direction,
            stop,
            filter,
            database,
        } => {
            if let Some(arguments) = database {
                config.lineage.arguments = arguments;
            }
            let query = commands::LineageQuery {
                id,
                depth,
                direction,
                stop,
                filters: filter,
            };
            commands::run_lineage(&config, &query, mode)
        }
        Commands::Stats { database } => {
            if let Some(arguments) = database {
                config.lineage.arguments = arguments;
            }
            commands::run_stats(&config, mode)
        }
    };

    if let Err(e) = &result {
        if mode.is_human() {
            provgraph::ui::error(&e.to_string());
        }
    }
    result
}
