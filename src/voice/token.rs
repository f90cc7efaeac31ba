//! Cached OAuth bearer token for Baidu speech APIs

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::BaiduCredentials;
use crate::{Error, Result};

/// Lifetime assumed when the token response omits `expires_in` (30 days)
const DEFAULT_EXPIRES_IN_SECS: i64 = 30 * 24 * 60 * 60;

/// A bearer token and the moment it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expiry_epoch_millis: i64,
    /// API key the token was issued for
    issued_for: String,
}

impl CachedToken {
    /// Whether the token can still be used at `now_millis`
    #[must_use]
    pub const fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expiry_epoch_millis
    }
}

/// Token exchange response (success or error shape)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Process-wide token cache shared by synthesis and recognition
///
/// Refreshes are serialized: concurrent callers wait for the one in flight
/// and then reuse its token.
pub struct TokenCache {
    client: reqwest::Client,
    endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Create an empty cache that exchanges credentials at `endpoint`
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return a valid token, fetching a new one if the cached one expired
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the vendor rejects the credentials,
    /// [`Error::Protocol`] if the response carries no `access_token`
    pub async fn get_token(&self, credentials: &BaiduCredentials) -> Result<String> {
        let api_key = credentials.api_key.expose();
        let mut cached = self.cached.lock().await;

        let now = now_millis();
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(now) && token.issued_for == api_key {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch(credentials).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Snapshot of the cached token, if any
    pub async fn cached(&self) -> Option<CachedToken> {
        self.cached.lock().await.clone()
    }

    async fn fetch(&self, credentials: &BaiduCredentials) -> Result<CachedToken> {
        tracing::debug!(endpoint = %self.endpoint, "requesting Baidu access token");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.api_key.expose()),
                ("client_secret", credentials.secret_key.expose()),
            ])
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

        if let Some(TokenResponse {
            error: Some(error),
            error_description,
            ..
        }) = parsed.as_ref()
        {
            let message = error_description.as_deref().unwrap_or(error.as_str());
            tracing::error!(status = %status, error = %error, "Baidu token request rejected");
            return Err(Error::Auth(format!(
                "failed to get Baidu access token: {message}"
            )));
        }

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Baidu token request failed");
            return Err(Error::Network {
                status: status.as_u16(),
                body,
            });
        }

        let Some(TokenResponse {
            access_token: Some(access_token),
            expires_in,
            ..
        }) = parsed
        else {
            return Err(Error::Protocol(
                "no access_token in Baidu token response".to_string(),
            ));
        };

        let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        tracing::info!(expires_in, "Baidu access token acquired");

        Ok(CachedToken {
            value: access_token,
            expiry_epoch_millis: now_millis().saturating_add(expires_in.saturating_mul(1000)),
            issued_for: credentials.api_key.expose().to_string(),
        })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
