use crate::config::SourceConfig;
use crate::error::Error;
use log::{error, info};
use reqwest::Client;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Exchanges the long-lived secret and refresh token for a bearer token.
    /// # Returns
    /// A Result containing either the bearer token or an [`Error::Auth`].
    async fn exchange(&self) -> Result<String, Error>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns a bearer token valid for at least the next request.
    async fn bearer_token(&self) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct IronSourceAuth {
    client: Client,
    auth_url: String,
    secret_key: String,
    refresh_token: String,
}

impl IronSourceAuth {
    pub fn new(client: Client, config: &SourceConfig) -> Self {
        IronSourceAuth {
            client,
            auth_url: config.auth_url.clone(),
            secret_key: config.secret_key.clone(),
            refresh_token: config.refresh_token.clone(),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for IronSourceAuth {
    async fn exchange(&self) -> Result<String, Error> {
        let resp = self
            .client
            .get(&self.auth_url)
            .header("secretKey", &self.secret_key)
            .header("refreshToken", &self.refresh_token)
            .send()
            .await
            .map_err(|err| Error::Auth {
                status: "transport".to_string(),
                body: err.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|err| Error::Auth {
            status: status.to_string(),
            body: err.to_string(),
        })?;

        if !status.is_success() {
            error!("Failed to get bearer token: {}", status);
            return Err(Error::Auth {
                status: status.to_string(),
                body,
            });
        }

        let token = parse_token(&body).ok_or_else(|| Error::Auth {
            status: status.to_string(),
            body: "empty token in response".to_string(),
        })?;

        info!("Successfully retrieved bearer token.");
        Ok(token)
    }
}

/// The auth endpoint answers with the bare token, sometimes as a JSON string.
fn parse_token(body: &str) -> Option<String> {
    let token = body.trim().trim_matches('"');
    (!token.is_empty()).then(|| token.to_string())
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Reuses a token until its TTL elapses. A zero TTL exchanges on every call.
pub struct CachedTokenProvider<S> {
    source: S,
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl<S: TokenSource> CachedTokenProvider<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        CachedTokenProvider {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    fn fresh(&self) -> Option<String> {
        let cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        cached
            .as_ref()
            .filter(|c| Instant::now() < c.expires_at)
            .map(|c| c.token.clone())
    }
}

#[async_trait::async_trait]
impl<S: TokenSource> TokenProvider for CachedTokenProvider<S> {
    async fn bearer_token(&self) -> Result<String, Error> {
        if let Some(token) = self.fresh() {
            return Ok(token);
        }

        let token = self.source.exchange().await?;

        if !self.ttl.is_zero() {
            let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
            *cached = Some(CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + self.ttl,
            });
        }

        Ok(token)
    }
}
