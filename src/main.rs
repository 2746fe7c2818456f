use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use crate::cli::config::{cmd_config, ConfigArgs};
use crate::cli::fetch::{cmd_fetch, FetchArgs};
use crate::cli::watch::{cmd_watch, WatchArgs};
use crate::cli::GlobalSettingsArgs;

/// Regostore - fetch and watch policy-definition releases
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    settings: GlobalSettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every artifact once and print a summary
    Fetch(FetchArgs),

    /// Keep the store refreshed on an interval until Ctrl+C
    Watch(WatchArgs),

    /// Show resolved settings and the fetch root
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    info!("Starting regostore v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Fetch(args) => cmd_fetch(args, cli.config.as_deref(), &cli.settings).await,
        Commands::Watch(args) => cmd_watch(args, cli.config.as_deref(), &cli.settings).await,
        Commands::Config(args) => cmd_config(args, cli.config.as_deref(), &cli.settings),
    };

    if let Err(err) = &result {
        error!("Command failed: {:#}", err);
    }
    result
}

fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output, logs go to stderr
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
