//! OpenSubtitles API v1 client implementation.
//!
//! This module provides a retry-enabled client for the endpoints the
//! gateway needs: feature search, subtitle search, login and download.

pub mod client;
pub mod types;

pub use client::OpenSubtitlesClient;
pub use types::*;
