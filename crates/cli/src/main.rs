mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bwtag_core::config::Config;
use bwtag_core::Tagger;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// bwtag: finds black & white photos in a photo library and tags them
#[derive(Parser)]
#[command(name = "bwtag", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log every photo as it is processed
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every unclassified photo (default)
    Run,
    /// Show how many photos are grayscale, color or still pending
    Status,
}

/// Without `--verbose` only errors are logged; per-photo failures are printed
/// above the progress spinner instead, so log lines never tear it.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,bwtag_core=debug"
    } else {
        "error"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    debug!(
        driver = ?config.database.driver,
        tolerance = config.grayscale_tolerance,
        base_url = %config.image_base_url,
        "loaded configuration"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let mut tagger = Tagger::connect(&config).context("failed to start")?;
            commands::run::run(&mut tagger, cli.verbose)?
        }
        Commands::Status => commands::status::run(&config)?,
    }

    Ok(())
}
