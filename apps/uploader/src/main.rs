//! osvup command-line uploader entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Upload geotagged photo and video sequences")]
struct Cli {
    /// Configuration file (defaults to the per-user location).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token; overrides OSVUP_TOKEN, the manifest and the config.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload one or more sequence manifests, in order.
    Upload {
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
    },
    /// Check which units of a sequence are ready to send, without uploading.
    Inspect { manifest: PathBuf },
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Command::Upload { manifests } => {
            rt.block_on(app::upload(config, &manifests, cli.token.as_deref()))
        }
        Command::Inspect { manifest } => {
            rt.block_on(app::inspect(&config, &manifest, cli.token.as_deref()))
        }
    }
}
