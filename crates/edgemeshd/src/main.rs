//! edgemeshd — the edgemesh device daemon.
//!
//! Single binary that assembles one device of the fleet:
//! - State store (redb)
//! - Device registry
//! - Scoring engine
//! - Service validator
//! - Placement orchestrator
//!
//! # Usage
//!
//! ```text
//! edgemeshd --config /etc/edgemesh.toml run
//! edgemeshd --config /etc/edgemesh.toml services add camera
//! ```
//!
//! In `run` mode every stdin line is a JSON service request; the placement
//! result is written to stdout as one JSON line.

mod config;
mod executor;
mod node;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edgemesh_placement::{PlacementResult, ResultMessage, ServiceRequest};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::node::Node;

const DEFAULT_LOG_FILTER: &str = "info,edgemeshd=debug,edgemesh=debug";

#[derive(Parser)]
#[command(name = "edgemeshd", about = "edgemesh device daemon")]
struct Cli {
    /// Path to edgemesh.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the device and place requests read from stdin.
    Run,

    /// List every device in the registry.
    Devices,

    /// Manage the services this device advertises.
    Services {
        #[command(subcommand)]
        action: ServicesAction,
    },

    /// Print this device's score and resource sample.
    Score {
        /// Device the score is computed for (defaults to this device).
        #[arg(long)]
        requester: Option<String>,
    },
}

#[derive(Subcommand)]
enum ServicesAction {
    List,
    Add { name: String },
    Remove { name: String },
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries results.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Run => run(&config).await,
        Command::Devices => {
            let node = Node::open(&config)?;
            for device in node.registry.list()? {
                println!("{}", serde_json::to_string(&device)?);
            }
            Ok(())
        }
        Command::Services { action } => services(&config, action),
        Command::Score { requester } => {
            let node = Node::open(&config)?;
            let requester = match requester {
                Some(id) => id,
                None => node.registry.self_id()?,
            };
            let sample = node.orchestrator.resources_for_peer(&requester)?;
            let score = node.engine.score_from_resources(&sample);
            println!(
                "{}",
                serde_json::json!({ "requester": requester, "score": score, "resources": sample })
            );
            Ok(())
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    info!("edgemesh daemon starting");
    let node = Node::open(config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let result = place(&node, &line).await;
                println!("{}", serde_json::to_string(&result)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("edgemesh daemon stopped");
    Ok(())
}

async fn place(node: &Node, line: &str) -> PlacementResult {
    match serde_json::from_str::<ServiceRequest>(line) {
        Ok(request) => node.orchestrator.request_service(request).await,
        Err(e) => {
            warn!(error = %e, "malformed service request");
            PlacementResult::failed(ResultMessage::InvalidParameter, "")
        }
    }
}

fn services(config: &Config, action: ServicesAction) -> anyhow::Result<()> {
    let node = Node::open(config)?;
    let services = match action {
        ServicesAction::List => node.registry.service_names()?,
        ServicesAction::Add { name } => node.registry.add_service_name(&name)?,
        ServicesAction::Remove { name } => node.registry.remove_service_name(&name)?,
        ServicesAction::Reset => node.registry.reset_service_names()?,
    };
    for name in services {
        println!("{name}");
    }
    Ok(())
}
