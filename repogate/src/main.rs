//! repogate - verify repository access and negotiate host trust.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{ConfigCommand, TrustCommand, VerifyArgs};
use repogate_common::RepogateConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "repogate")]
#[command(author, version, about = "Verify repository access and negotiate host trust")]
struct Cli {
    /// Path to config file (defaults to the per-user config directory)
    #[arg(short, long, global = true, env = "REPOGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that a repository is reachable
    Verify(VerifyArgs),

    /// Inspect stored trust decisions
    #[command(subcommand)]
    Trust(TrustCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = RepogateConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    init_logging(&config, cli.verbose, cli.log_json);
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Verify(args) => commands::verify::run(&args, &config).await,
        Commands::Trust(command) => commands::trust::run(&command, &config),
        Commands::Config(command) => commands::config::run(&command, &config, cli.config.as_deref()),
    }
}

fn init_logging(config: &RepogateConfig, verbose: bool, json: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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
