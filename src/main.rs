//! Graph Engine - worker binary
//!
//! Runs the analytics worker either as a JSON-lines subprocess
//! (`graph-engine serve`) or for a single request on a graph file
//! (`graph-engine analyze centrality --input graph.json`).
//!
//! Logs always go to stderr so stdout carries protocol lines / results only.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use research_graph_engine::graph::GraphData;
use research_graph_engine::worker::{
    AnalyticsWorker, Gateway, RequestKind, StdioHost, WorkerMessage, WorkerRequest,
};
use research_graph_engine::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "graph-engine")]
#[command(about = "Graph analytics worker for research knowledge graphs")]
#[command(version)]
struct Cli {
    /// Path to the YAML config file (defaults to ./config.yaml)
    #[arg(short, long, global = true, env = "GRAPH_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-lines requests on stdin, replies on stdout
    Serve,

    /// Run one analysis on a graph file and print the terminal message
    Analyze {
        /// Operation: centrality, topology, layout, communities, path
        /// (or the wire name, e.g. CALCULATE_CENTRALITY)
        operation: String,

        /// GraphData JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Options as a JSON object, e.g. '{"iterations": 200}'
        #[arg(short, long)]
        options: Option<String>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let gateway = Gateway::new(config.defaults.clone());
    let worker = AnalyticsWorker::spawn(Arc::new(gateway), &config.worker)?;

    match cli.command {
        Commands::Serve => StdioHost::new(worker).run().await,
        Commands::Analyze {
            operation,
            input,
            options,
            pretty,
        } => run_analyze(&worker, &operation, &input, options.as_deref(), pretty).await,
    }
}

/// Initialize tracing on stderr (stdout is reserved for protocol output)
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,research_graph_engine=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_analyze(
    worker: &AnalyticsWorker,
    operation: &str,
    input: &Path,
    options: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let kind = parse_operation(operation)?;
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let graph_data: GraphData = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid graph document", input.display()))?;

    let mut request = WorkerRequest::new(kind, uuid::Uuid::new_v4().to_string(), graph_data);
    if let Some(raw) = options {
        let value = serde_json::from_str(raw).context("--options must be a JSON object")?;
        request = request.with_options(value);
    }

    info!(
        op = %kind,
        nodes = request.payload.graph_data.nodes.len(),
        edges = request.payload.graph_data.edges.len(),
        "Running analysis on {}",
        input.display()
    );

    let mut stream = worker.submit(request).await?;
    while let Some(msg) = stream.next().await {
        match &msg {
            WorkerMessage::Progress { payload, .. } => {
                debug!("Progress: {:.0}%", payload.progress * 100.0);
            }
            WorkerMessage::Success { .. } | WorkerMessage::Error { .. } => {
                let out = if pretty {
                    serde_json::to_string_pretty(&msg)?
                } else {
                    serde_json::to_string(&msg)?
                };
                println!("{}", out);
                if let WorkerMessage::Error { payload, .. } = msg {
                    bail!("{} failed: {}", kind, payload.error);
                }
                return Ok(());
            }
        }
    }
    bail!("Worker stopped before answering")
}

/// Accept short names (`centrality`) as well as wire names (`CALCULATE_CENTRALITY`).
fn parse_operation(operation: &str) -> Result<RequestKind> {
    let normalized = operation.trim().to_uppercase().replace('-', "_");
    let kind = match normalized.as_str() {
        "CENTRALITY" => RequestKind::CalculateCentrality,
        "TOPOLOGY" => RequestKind::AnalyzeTopology,
        "LAYOUT" => RequestKind::OptimizeLayout,
        "COMMUNITIES" => RequestKind::DetectCommunities,
        "PATH" => RequestKind::FindShortestPath,
        other => other.parse()?,
    };
    Ok(kind)
}
