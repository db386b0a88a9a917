//! CLI for capturing accessibility tree snapshots.
//!
//! Replays a saved host dump through the capture pipeline and writes the
//! resulting snapshot, or inspects snapshots written earlier.
//!
//! # Usage
//!
//! ```bash
//! # Capture the active window of a saved host dump to the configured path
//! treesnap capture --source dump.json
//!
//! # Capture a hierarchy saved with `adb shell uiautomator dump`
//! treesnap capture --source window_dump.xml -o /tmp/ui_tree.json
//!
//! # Capture to an explicit file with unique pre-order indices
//! treesnap capture --source dump.json -o /tmp/ui_tree.json --global-index
//!
//! # Refuse trees deeper than 64 levels or larger than 5000 nodes
//! treesnap capture --source dump.json --max-depth 64 --max-nodes 5000
//!
//! # Print a captured snapshot as an indented tree
//! treesnap show /tmp/ui_tree.json
//!
//! # Show the effective configuration as JSON
//! treesnap -f json config
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use treesnap_core::capture::{CaptureError, IndexMode};
use treesnap_core::capturer::Capturer;
use treesnap_core::config::{treesnap_dir, CaptureConfig};
use treesnap_core::fixture::FixtureInspector;
use treesnap_core::persist;
use treesnap_core::snapshot::ElementSnapshot;

/// Capture accessibility trees into JSON snapshots.
#[derive(Parser)]
#[command(name = "treesnap")]
#[command(about = "Capture live accessibility trees into JSON snapshots")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ~/.treesnap/config.json)
    #[arg(short, long, env = "TREESNAP_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Capture the active window of a host dump and write the snapshot
    Capture {
        /// Host dump to capture from (JSON dump or uiautomator XML)
        #[arg(short, long)]
        source: PathBuf,
        /// Snapshot destination (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Index given to the root element
        #[arg(long)]
        root_index: Option<usize>,
        /// Number nodes uniquely in pre-order instead of per sibling group
        #[arg(long)]
        global_index: bool,
        /// Fail if the tree is deeper than this (root is depth 0)
        #[arg(long)]
        max_depth: Option<usize>,
        /// Fail if the tree has more nodes than this
        #[arg(long)]
        max_nodes: Option<usize>,
        /// Delay after the UI goes idle, in milliseconds
        #[arg(long, env = "TREESNAP_SETTLE_MS")]
        settle_ms: Option<u64>,
        /// Indent the written JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Print a captured snapshot as an indented tree
    Show {
        /// Snapshot file to read
        snapshot: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration back to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Input(String),
    Capture(String),
    Persistence(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Capture(_) => ExitCode::from(1),
            CliError::Input(_) => ExitCode::from(2),
            CliError::Persistence(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Input(msg) => write!(f, "Input error: {}", msg),
            CliError::Capture(msg) => write!(f, "Capture failed: {}", msg),
            CliError::Persistence(msg) => write!(f, "Persistence failure: {}", msg),
        }
    }
}

impl From<CaptureError> for CliError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Persistence(failure) => CliError::Persistence(failure.to_string()),
            other => CliError::Capture(other.to_string()),
        }
    }
}

fn load_config(cli: &Cli) -> CaptureConfig {
    match &cli.config {
        Some(path) => CaptureConfig::load_from(path),
        None => CaptureConfig::load(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(&cli);

    match cli.command {
        Command::Capture {
            ref source,
            ref output,
            root_index,
            global_index,
            max_depth,
            max_nodes,
            settle_ms,
            pretty,
        } => {
            if let Some(output) = output {
                config.output_path = output.clone();
            }
            if let Some(root_index) = root_index {
                config.root_index = root_index;
            }
            if global_index {
                config.index_mode = IndexMode::Global;
            }
            if max_depth.is_some() {
                config.limits.max_depth = max_depth;
            }
            if max_nodes.is_some() {
                config.limits.max_nodes = max_nodes;
            }
            if let Some(settle_ms) = settle_ms {
                config.settle_delay_ms = settle_ms;
            }
            config.pretty |= pretty;
            tracing::debug!(source = %source.display(), output = %config.output_path.display(), "starting capture");

            let inspector = FixtureInspector::load(source).map_err(|e| {
                CliError::Input(format!("Failed to load '{}': {}", source.display(), e))
            })?;
            config.prepare_output_dir().map_err(|e| {
                CliError::Persistence(format!(
                    "Failed to create '{}': {}",
                    treesnap_dir().display(),
                    e
                ))
            })?;
            let capturer = Capturer::new(Arc::new(inspector), config);
            let report = capturer.capture().await?;

            if cli.format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report)
                        .map_err(|e| CliError::Input(e.to_string()))?
                );
            } else if !cli.quiet {
                if report.root_available {
                    eprintln!(
                        "Captured {} nodes ({} unavailable) to {}",
                        report.nodes,
                        report.unavailable,
                        report.path.display()
                    );
                } else {
                    eprintln!("No root element available; wrote null to {}", report.path.display());
                }
            }
            Ok(())
        }
        Command::Show { ref snapshot } => {
            let json = std::fs::read_to_string(snapshot).map_err(|e| {
                CliError::Input(format!("Failed to read '{}': {}", snapshot.display(), e))
            })?;
            let root = persist::parse(&json).map_err(|e| {
                CliError::Input(format!("Invalid snapshot '{}': {}", snapshot.display(), e))
            })?;

            if cli.format == OutputFormat::Json {
                let (nodes, nulls) = root
                    .as_ref()
                    .map(|r| (r.node_count(), r.null_count()))
                    .unwrap_or((0, 0));
                println!(
                    "{}",
                    serde_json::json!({
                        "root_available": root.is_some(),
                        "nodes": nodes,
                        "unavailable": nulls,
                    })
                );
            } else {
                print!("{}", format_tree(root.as_ref()));
            }
            Ok(())
        }
        Command::Config { save } => {
            if save {
                let result = match &cli.config {
                    Some(path) => config.save_to(path),
                    None => config.save(),
                };
                result.map_err(|e| CliError::Persistence(format!("Failed to save config: {}", e)))?;
                if !cli.quiet {
                    eprintln!("Configuration saved");
                }
            }

            if cli.format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .map_err(|e| CliError::Input(e.to_string()))?
                );
            } else {
                println!("output_path: {}", config.output_path.display());
                println!("root_index: {}", config.root_index);
                println!(
                    "index_mode: {}",
                    match config.index_mode {
                        IndexMode::SiblingLocal => "sibling_local",
                        IndexMode::Global => "global",
                    }
                );
                println!("max_depth: {}", format_limit(config.limits.max_depth));
                println!("max_nodes: {}", format_limit(config.limits.max_nodes));
                println!("settle_delay_ms: {}", config.settle_delay_ms);
                println!("idle_timeout_ms: {}", config.idle_timeout_ms);
                println!("pretty: {}", config.pretty);
            }
            Ok(())
        }
    }
}

fn format_limit(limit: Option<usize>) -> String {
    limit.map_or_else(|| "none".to_string(), |l| l.to_string())
}

/// Renders a snapshot as one line per node, indented two spaces per level.
fn format_tree(root: Option<&ElementSnapshot>) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];

    while let Some((node, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        match node {
            Some(node) => {
                out.push_str(&format!("{}{}\n", indent, node.display_text()));
                for child in node.children.iter().rev() {
                    stack.push((child.as_ref(), depth + 1));
                }
            }
            None => out.push_str(&format!("{}(null)\n", indent)),
        }
    }
    out
}
