//! `rssdld` daemon: polls feeds, advances episodes and serves the REST API.

use clap::Parser;
use rssdld::config::{CONFIG_FILE, Config};
use rssdld::{EpisodeManager, Error, Result, run_until_signal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Name of the configuration directory under the home directory
const DEFAULT_CONFIG_DIR: &str = ".rssdldmng";

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "rssdld", version)]
#[command(about = "Download TV episodes announced in RSS feeds and track them into your media library")]
struct Cli {
    /// Configuration directory (default: ~/.rssdldmng)
    #[arg(short, long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Do not start the REST API
    #[arg(long)]
    no_api: bool,
}

impl Cli {
    fn config_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.config {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_CONFIG_DIR))
            .ok_or_else(|| Error::Config {
                message: "no home directory found; pass --config".to_string(),
                key: Some("config".to_string()),
            })
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_dir = cli.config_dir()?;
    let config_path = config_dir.join(CONFIG_FILE);

    let mut config = Config::load_or_create(&config_path)?;
    config.resolve_paths(&config_dir);

    tracing::info!(
        config = %config_path.display(),
        database = %config.persistence.database_path.display(),
        feeds = config.feeds.len(),
        "Starting rssdld"
    );

    let manager = EpisodeManager::new(config).await?;
    run_until_signal(manager, !cli.no_api).await?;

    tracing::info!("rssdld stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "rssdld failed");
            ExitCode::FAILURE
        }
    }
}
