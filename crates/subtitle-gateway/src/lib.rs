//! Subtitle gateway for the OpenSubtitles REST API.
//!
//! Wraps the upstream search, login and download endpoints behind two
//! operations: check that a movie exists, and fetch its subtitle text.
//! Upstream failures never escape; they collapse into `false` or a
//! not-found [`shared::SubtitleResult`].

pub mod api;
pub mod auth;
pub mod gateway;

#[cfg(test)]
pub(crate) mod testing;

pub use api::OpenSubtitlesClient;
pub use auth::{Credentials, TokenCache};
pub use gateway::{SubtitleGateway, SubtitleService};
