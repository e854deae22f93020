//! OpenSubtitles API client with retry logic.

use super::types::*;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::config::SubtitlesConfig;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// OpenSubtitles API v1 client
#[derive(Debug, Clone)]
pub struct OpenSubtitlesClient {
    /// HTTP client
    client: Client,
    /// Base URL for the API
    base_url: String,
    /// Consumer API key
    api_key: String,
    /// Maximum retries for transient failures
    max_retries: u32,
    /// Base delay for retry (exponential backoff)
    retry_delay_ms: u64,
    /// Timeout for the final subtitle file download
    download_timeout: Duration,
}

impl OpenSubtitlesClient {
    /// Create a new client from the gateway configuration.
    ///
    /// Fails when no API key is configured; every upstream endpoint needs one.
    pub fn new(config: &SubtitlesConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("OPEN_SUBTITLES_API_KEY is required"))?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn api_request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Api-Key", &self.api_key)
            .header(header::ACCEPT, "application/json")
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }

    /// Send a request with retry on network errors, 429 and 5xx responses.
    async fn send<F>(&self, label: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        for attempt in 0..=self.max_retries {
            debug!(request = label, attempt = attempt + 1, "Making API request");

            match build().send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

                    warn!(
                        request = label,
                        status = %status,
                        error = %error_text,
                        "Request failed"
                    );

                    if retryable && attempt < self.max_retries {
                        let delay = self.backoff(attempt);
                        debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                        sleep(delay).await;
                        continue;
                    }

                    bail!("{} failed with status {}: {}", label, status, error_text);
                }
                Err(e) => {
                    warn!(request = label, error = %e, "Request error");

                    if attempt < self.max_retries {
                        let delay = self.backoff(attempt);
                        debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                        sleep(delay).await;
                        continue;
                    }

                    return Err(e).with_context(|| {
                        format!("{} failed after {} retries", label, self.max_retries)
                    });
                }
            }
        }

        Err(anyhow!("{} failed after all retries", label))
    }

    async fn json<T: DeserializeOwned>(label: &str, response: reqwest::Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {} response", label))
    }

    /// Search `/features` for movies matching a title
    pub async fn search_features(&self, title: &str) -> Result<Vec<Feature>> {
        debug!(title = %title, "Searching features");
        let url = self.url("/features");
        let response = self
            .send("feature search", || {
                self.api_request(self.client.get(&url))
                    .query(&[("query", title), ("type", "movie")])
            })
            .await?;

        let body: DataResponse<Feature> = Self::json("feature search", response).await?;
        Ok(body.data)
    }

    /// Search `/subtitles`, most downloaded first, skipping machine
    /// translations and hearing-impaired tracks
    pub async fn search_subtitles(&self, title: &str, language: &str) -> Result<Vec<SubtitleEntry>> {
        debug!(title = %title, language = %language, "Searching subtitles");
        let url = self.url("/subtitles");
        let response = self
            .send("subtitle search", || {
                self.api_request(self.client.get(&url)).query(&[
                    ("query", title),
                    ("languages", language),
                    ("type", "movie"),
                    ("order_by", "download_count"),
                    ("order_direction", "desc"),
                    ("ai_translated", "exclude"),
                    ("hearing_impaired", "exclude"),
                ])
            })
            .await?;

        let body: DataResponse<SubtitleEntry> = Self::json("subtitle search", response).await?;
        Ok(body.data)
    }

    /// Exchange account credentials for a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        info!("Logging in to OpenSubtitles");
        let url = self.url("/login");
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send("login", || self.api_request(self.client.post(&url)).json(&body))
            .await?;

        let login: LoginResponse = Self::json("login", response).await?;
        login
            .into_token()
            .ok_or_else(|| anyhow!("Login response did not contain a token"))
    }

    /// Request a temporary download link for a subtitle file
    pub async fn request_download(&self, file_id: u64, token: Option<&str>) -> Result<DownloadResponse> {
        debug!(file_id, authenticated = token.is_some(), "Requesting download link");
        let url = self.url("/download");
        let body = DownloadRequest { file_id };
        let response = self
            .send("download request", || {
                let builder = self.api_request(self.client.post(&url)).json(&body);
                match token {
                    Some(token) => builder.bearer_auth(token),
                    None => builder,
                }
            })
            .await?;

        Self::json("download request", response).await
    }

    /// Fetch the raw bytes behind a download link
    pub async fn fetch_file(&self, link: &str) -> Result<Vec<u8>> {
        debug!(link = %link, "Fetching subtitle file");
        let response = self
            .send("subtitle file fetch", || {
                self.client.get(link).timeout(self.download_timeout)
            })
            .await?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read subtitle file body")?;
        Ok(bytes.to_vec())
    }
}
