//! The two gateway operations: movie verification and subtitle download.

use crate::api::OpenSubtitlesClient;
use crate::auth::TokenCache;
use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::config::SubtitlesConfig;
use shared::{MissReason, MovieQuery, SubtitleResult};
use tracing::{debug, info, warn};

/// The operations the tool server exposes
#[async_trait]
pub trait SubtitleService: Send + Sync {
    /// True when the subtitle database knows a movie by this title.
    async fn verify_movie(&self, title: &str) -> bool;

    /// Subtitle text for the best match, in `language` or the default one.
    async fn download_subtitles(&self, title: &str, language: Option<&str>) -> SubtitleResult;
}

/// OpenSubtitles-backed implementation of [`SubtitleService`]
pub struct SubtitleGateway {
    client: OpenSubtitlesClient,
    tokens: TokenCache,
    default_language: String,
}

impl SubtitleGateway {
    pub fn new(client: OpenSubtitlesClient, tokens: TokenCache, default_language: impl Into<String>) -> Self {
        Self {
            client,
            tokens,
            default_language: default_language.into(),
        }
    }

    pub fn from_config(config: &SubtitlesConfig) -> Result<Self> {
        let client = OpenSubtitlesClient::new(config).context("Failed to create subtitle client")?;
        let tokens = TokenCache::from_config(config);

        info!(
            base_url = %config.base_url,
            configured_token = tokens.current().is_some(),
            login_available = tokens.has_credentials(),
            "Subtitle gateway ready"
        );

        Ok(Self::new(client, tokens, config.language.clone()))
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    async fn find_movie(&self, query: &MovieQuery) -> Result<bool> {
        let features = self.client.search_features(&query.title).await?;
        debug!(title = %query.title, results = features.len(), "Feature search complete");
        Ok(features.iter().any(|feature| feature.is_movie()))
    }

    async fn fetch_subtitles(&self, query: &MovieQuery, language: &str) -> Result<SubtitleResult> {
        let entries = self.client.search_subtitles(&query.title, language).await?;

        let Some(entry) = entries.first() else {
            info!(title = %query.title, language = %language, "No subtitles found");
            return Ok(SubtitleResult::missing(MissReason::NoMatch));
        };

        let Some(file_id) = entry.file_id() else {
            info!(title = %query.title, "Subtitle entry has no file id");
            return Ok(SubtitleResult::missing(MissReason::NoFile));
        };

        let token = self
            .tokens
            .resolve(|credentials| async move {
                self.client
                    .login(&credentials.username, &credentials.password)
                    .await
            })
            .await;

        let download = self
            .client
            .request_download(file_id, token.as_ref().map(|t| t.value.as_str()))
            .await?;

        let Some(link) = download.link.filter(|link| !link.trim().is_empty()) else {
            warn!(title = %query.title, file_id, "Download link missing from response");
            return Ok(SubtitleResult::missing(MissReason::NoDownloadLink));
        };

        let bytes = self.client.fetch_file(&link).await?;
        let text = decode_subtitle(&bytes);
        if text.trim().is_empty() {
            warn!(title = %query.title, file_id, "Downloaded subtitle file is empty");
            return Ok(SubtitleResult::missing(MissReason::FetchFailed));
        }

        info!(
            title = %query.title,
            file_id,
            bytes = bytes.len(),
            remaining_downloads = ?download.remaining,
            "Subtitles downloaded"
        );
        Ok(SubtitleResult::found(text))
    }
}

#[async_trait]
impl SubtitleService for SubtitleGateway {
    async fn verify_movie(&self, title: &str) -> bool {
        let query = MovieQuery::new(title);
        if query.is_blank() {
            return false;
        }

        match self.find_movie(&query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(title = %query.title, error = %format!("{:#}", e), "Movie verification failed");
                false
            }
        }
    }

    async fn download_subtitles(&self, title: &str, language: Option<&str>) -> SubtitleResult {
        let query = MovieQuery::new(title);
        if query.is_blank() {
            return SubtitleResult::missing(MissReason::NoMatch);
        }

        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_language);

        match self.fetch_subtitles(&query, language).await {
            Ok(result) => result,
            Err(e) => {
                warn!(title = %query.title, error = %format!("{:#}", e), "Subtitle download failed");
                SubtitleResult::missing(MissReason::FetchFailed)
            }
        }
    }
}

/// Decode subtitle bytes as UTF-8, falling back to ISO-8859-1.
fn decode_subtitle(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // ISO-8859-1 maps every byte to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
