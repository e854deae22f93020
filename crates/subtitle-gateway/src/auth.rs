//! Bearer token cache for the subtitle database.
//!
//! The cache is an owned value handed to the gateway at construction time.
//! A configured token is used as-is; otherwise credentials are exchanged
//! once and the resulting token lives for as long as the cache does.
//! Tokens are never refreshed: a revoked token needs a restart.

use shared::config::SubtitlesConfig;
use shared::{AuthToken, TokenSource};
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Account credentials for the login exchange
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lazily filled, process-lifetime token slot
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: OnceCell<AuthToken>,
    credentials: Option<Credentials>,
}

impl TokenCache {
    /// No token and no way to get one: requests go out unauthenticated.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cache already holding a configured bearer token.
    pub fn preconfigured(token: impl Into<String>) -> Self {
        Self {
            slot: OnceCell::new_with(Some(AuthToken {
                value: token.into(),
                obtained_via: TokenSource::Configured,
            })),
            credentials: None,
        }
    }

    /// An empty cache that can log in with the given credentials.
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            slot: OnceCell::new(),
            credentials: Some(Credentials {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Pick the cache flavour the configuration asks for.
    pub fn from_config(config: &SubtitlesConfig) -> Self {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(token) = non_blank(&config.token) {
            return Self::preconfigured(token);
        }

        match (non_blank(&config.username), non_blank(&config.password)) {
            (Some(username), Some(password)) => Self::with_credentials(username, password),
            _ => Self::empty(),
        }
    }

    /// The cached token, if any
    pub fn current(&self) -> Option<AuthToken> {
        self.slot.get().cloned()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Return the cached token, logging in first when credentials allow it.
    ///
    /// Concurrent callers share a single login. A failed login is not cached,
    /// so a later call tries again; this call proceeds without a token.
    pub async fn resolve<F, Fut>(&self, login: F) -> Option<AuthToken>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        if let Some(token) = self.slot.get() {
            return Some(token.clone());
        }

        let credentials = self.credentials.clone()?;

        let result = self
            .slot
            .get_or_try_init(|| async move {
                let value = login(credentials).await?;
                info!("Obtained subtitle database token via login");
                Ok::<_, anyhow::Error>(AuthToken {
                    value,
                    obtained_via: TokenSource::UsernamePassword,
                })
            })
            .await;

        match result {
            Ok(token) => Some(token.clone()),
            Err(e) => {
                warn!(error = %e, "Login failed, continuing unauthenticated");
                None
            }
        }
    }
}
