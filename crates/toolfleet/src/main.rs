//! toolfleet - run a fleet of proxied MCP tool servers.
//!
//! Main entry point for the toolfleet CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{call, run, servers, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// toolfleet - run a fleet of MCP tool servers behind local HTTP proxies
#[derive(Parser)]
#[command(name = "toolfleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "TOOLFLEET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured servers without starting them
    Servers(servers::ServersArgs),

    /// Start the fleet and list every discovered tool
    Tools(tools::ToolsArgs),

    /// Invoke a tool on one server
    Call(call::CallArgs),

    /// Start the fleet and keep it running until Ctrl-C
    Run(run::RunArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, warnings) = match &cli.config {
        Some(path) => {
            let config = toolfleet_config::load_config_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            (config, Vec::new())
        }
        None => {
            let loaded = toolfleet_config::load_config(None)?;
            (loaded.config, loaded.warnings)
        }
    };

    // Console (human-readable) plus daily rolling JSON file
    let filter = if cli.verbose {
        "toolfleet=debug,toolfleet_mcp=debug,toolfleet_config=debug,info"
    } else {
        "toolfleet=info,toolfleet_mcp=info,toolfleet_config=info,warn"
    };

    let log_dir = config
        .logging
        .as_ref()
        .and_then(|l| l.dir.clone())
        .or_else(toolfleet_config::default_log_dir)
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "toolfleet.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "toolfleet=trace,toolfleet_mcp=trace,toolfleet_config=trace,info",
                )),
        )
        .init();

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Servers(args) => servers::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Call(args) => call::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
    }
}
