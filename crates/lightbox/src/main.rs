//! Lightbox CLI - static photo album builder.
//!
//! Lightbox reads a directory of collections (one folder per album, each with
//! an `album.json` descriptor), generates resized variants and metadata for
//! every photo, and writes a manifest describing the result. Work done by an
//! earlier run is skipped.
//!
//! # Usage
//!
//! ```bash
//! # Build every collection under ./albums into ./output
//! lightbox build ./albums -o ./output --manifest site.json
//!
//! # View configuration
//! lightbox config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Lightbox - static photo album builder.
#[derive(Parser, Debug)]
#[command(name = "lightbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "LIGHTBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate derived assets and a manifest for every collection
    Build(cli::build::BuildArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match &cli.config {
        Some(path) => {
            let path = cli::expand_path(path);
            lightbox_core::Config::load_from(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?
        }
        None => match lightbox_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `lightbox config path`."
                );
                lightbox_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lightbox v{}", lightbox_core::VERSION);

    match cli.command {
        Commands::Build(args) => cli::build::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config).await,
    }
}
