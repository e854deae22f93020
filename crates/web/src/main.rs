//! CineChunks web front end.

use anyhow::{Context, Result};
use cinechunks_web::build_router;
use clap::Parser;
use episode_planner::EpisodePlanner;
use shared::{Config, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the CineChunks web front end", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }

    shared::logging::init(LogConfig::for_component(
        &config,
        "cinechunks-web",
        args.verbose,
    ))?;

    info!("CineChunks web front end starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let planner = EpisodePlanner::from_config(&config.planner)
        .context("Failed to initialize episode planner")?;
    let app = build_router(Arc::new(planner));

    let bind = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    let addr = listener.local_addr()?;

    info!(address = %addr, "Web front end listening");

    axum::serve(listener, app)
        .await
        .context("Web front end terminated")?;

    Ok(())
}
