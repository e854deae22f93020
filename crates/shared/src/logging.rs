//! Logging infrastructure for the CineChunks services.
//!
//! Console output is always human-readable; file output rotates daily and can
//! be switched to JSON for log shippers.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Workspace crates that share the component's log level.
const WORKSPACE_TARGETS: &[&str] = &[
    "shared",
    "subtitle_gateway",
    "tool_server",
    "episode_planner",
    "cinechunks_web",
];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log directory path
    pub log_dir: String,
    /// Component name (used for log file naming)
    pub component: String,
    /// Default log level
    pub default_level: Level,
    /// Enable console output
    pub console: bool,
    /// Enable file output
    pub file: bool,
    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            component: "cinechunks".to_string(),
            default_level: Level::INFO,
            console: true,
            file: false,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration for `component` from the shared config file.
    pub fn for_component(config: &crate::Config, component: &str, verbose: bool) -> Self {
        let default_level = if verbose {
            Level::DEBUG
        } else {
            config.log_level()
        };

        Self {
            log_dir: config.logging.log_dir.clone(),
            component: component.to_string(),
            default_level,
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }
}

/// Default filter directives used when `RUST_LOG` is not set.
fn default_directives(config: &LogConfig) -> String {
    let level = config.default_level.to_string().to_lowercase();
    let component = config.component.replace('-', "_");

    let mut directives = vec![format!("{}={}", component, level)];
    directives.extend(
        WORKSPACE_TARGETS
            .iter()
            .filter(|target| **target != component)
            .map(|target| format!("{}={}", target, level)),
    );
    directives.push("tower_http=info".to_string());
    directives.push("hyper=warn".to_string());
    directives.push("reqwest=warn".to_string());

    directives.join(",")
}

/// Initialize logging with the given configuration
///
/// Sets up tracing with:
/// - Console output with targets and levels
/// - Optional daily-rotated file output, plain or JSON
/// - Per-crate levels, overridable through `RUST_LOG`
pub fn init(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config)));

    let mut layers = Vec::new();

    if config.console {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(std::io::stdout)
            .boxed();
        layers.push(console_layer);
    }

    if config.file {
        let log_dir = Path::new(&config.log_dir);
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;

        let file_appender = tracing_appender::rolling::daily(log_dir, &config.component);

        let file_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(file_appender)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .boxed()
        };

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        file_logging = config.file,
        "Logging initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config() {
        let config = LogConfig::default();
        assert_eq!(config.component, "cinechunks");
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.console);
        assert!(!config.file);
    }

    #[test]
    fn test_for_component_verbose() {
        let config = crate::Config::default();
        let log = LogConfig::for_component(&config, "cinechunks-web", true);
        assert_eq!(log.component, "cinechunks-web");
        assert_eq!(log.default_level, Level::DEBUG);
    }

    #[test]
    fn test_default_directives() {
        let config = LogConfig {
            component: "cinechunks-web".to_string(),
            default_level: Level::DEBUG,
            ..Default::default()
        };
        let directives = default_directives(&config);

        assert!(directives.starts_with("cinechunks_web=debug"));
        assert!(directives.contains("episode_planner=debug"));
        assert_eq!(directives.matches("cinechunks_web=").count(), 1);
        assert!(directives.ends_with("reqwest=warn"));
    }
}
