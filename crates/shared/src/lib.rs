//! Shared library for the CineChunks services.
//!
//! This crate provides common functionality used across all crates:
//! - Configuration management
//! - Logging infrastructure
//! - Data model (queries, tool calls, episode plans)
//! - Contract-level error kinds
//! - Tool protocol wire types

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod protocol;

// Re-export commonly used types
pub use config::Config;
pub use error::{PlanError, ToolError};
pub use logging::LogConfig;
pub use models::*;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
