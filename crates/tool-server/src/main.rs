//! CineChunks tool server.

use anyhow::{Context, Result};
use clap::Parser;
use shared::{Config, LogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use subtitle_gateway::SubtitleGateway;
use tool_server::{build_router, ToolDispatcher};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the CineChunks subtitle tools over MCP", long_about = None)]
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
        config.tool_server.host = host;
    }
    if let Some(port) = args.port {
        config.tool_server.port = port;
    }

    shared::logging::init(LogConfig::for_component(
        &config,
        "cinechunks-tools",
        args.verbose,
    ))?;

    info!("CineChunks tool server starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let gateway = SubtitleGateway::from_config(&config.subtitles)
        .context("Failed to initialize subtitle gateway")?;
    let dispatcher = ToolDispatcher::new(Arc::new(gateway), config.subtitles.language.clone());
    let app = build_router(dispatcher, &config.tool_server.path);

    let bind = format!("{}:{}", config.tool_server.host, config.tool_server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    let addr = listener.local_addr()?;

    info!(address = %addr, path = %config.tool_server.path, "Tool server listening");

    axum::serve(listener, app)
        .await
        .context("Tool server terminated")?;

    Ok(())
}
