//! syncdriftd - background multi-target file synchronization daemon
//!
//! Loads configuration, brings up the primary target and its manager, then
//! runs until interrupted.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use syncdrift_service::config::Config;
use syncdrift_service::FileManagementService;

#[derive(Parser, Debug)]
#[command(name = "syncdriftd", about = "Multi-target file synchronization daemon")]
struct Args {
    /// Path to the YAML configuration file. Defaults to the
    /// platform-appropriate config directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(config = %config_path.display(), "starting syncdriftd");

    let service = FileManagementService::new(config);
    service.initialize().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    service.dispose().await;

    Ok(())
}
