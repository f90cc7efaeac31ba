//! Baidu text-to-speech (`text2audio`)

use std::sync::Arc;

use serde::Deserialize;

use super::CUID;
use super::token::TokenCache;
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Longest text accepted by one synthesis request, in characters
pub const MAX_TEXT_CHARS: usize = 1024;

/// Voice (`per`) used when the configured voice is not numeric
pub const DEFAULT_PERSON: i64 = 0;

/// Error body returned instead of audio
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    err_no: Option<i64>,
    err_msg: Option<String>,
}

/// Trim `text` to what one request accepts; `None` means nothing to say
#[must_use]
pub fn prepare_text(text: &str) -> Option<&str> {
    if text.trim().is_empty() {
        return None;
    }
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                chars = text.chars().count(),
                max = MAX_TEXT_CHARS,
                "text too long, truncating"
            );
            Some(&text[..cut])
        }
        None => Some(text),
    }
}

/// Form fields for one request, in wire order
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn form_fields(text: &str, token: &str, config: &VoiceConfig) -> Vec<(&'static str, String)> {
    let speed = (config.effective_rate() * 5.0).round() as i32;
    let pitch = (config.effective_pitch() * 5.0).round() as i32;
    let language = if config.is_chinese() { "zh" } else { "en" };

    vec![
        ("tex", text.to_string()),
        ("tok", token.to_string()),
        ("cuid", CUID.to_string()),
        ("ctp", "1".to_string()),
        ("lan", language.to_string()),
        ("spd", speed.to_string()),
        ("pit", pitch.to_string()),
        ("vol", "5".to_string()),
        ("per", config.numeric_voice(DEFAULT_PERSON).to_string()),
        ("aue", "3".to_string()),
    ]
}

/// Client for Baidu TTS
pub struct BaiduTts {
    client: reqwest::Client,
    endpoint: String,
    tokens: Arc<TokenCache>,
}

impl BaiduTts {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            tokens,
        }
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// Returns `Ok(None)` without any request when the text is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if credentials are missing (no request is made)
    /// - token errors from [`TokenCache::get_token`]
    /// - [`Error::Network`] on a non-success status
    /// - [`Error::Protocol`] if the vendor answers with anything but audio
    pub async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Option<Vec<u8>>> {
        let Some(text) = prepare_text(text) else {
            tracing::warn!("empty text, skipping synthesis");
            return Ok(None);
        };

        let credentials = config.baidu_credentials()?;
        let token = self.tokens.get_token(credentials).await?;

        tracing::info!(
            vendor = "baidu",
            chars = text.chars().count(),
            "requesting speech synthesis"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form_fields(text, &token, config))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Error::from_response(response).await;
            tracing::error!(error = %error, "Baidu TTS error");
            return Err(error);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !content_type.starts_with("audio") {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(content_type = %content_type, body = %body, "Baidu TTS returned no audio");
            return Err(describe_error(&body));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(bytes = bytes.len(), "Baidu audio received");
        Ok(Some(bytes.to_vec()))
    }
}

fn describe_error(body: &str) -> Error {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload {
            err_no: Some(err_no),
            err_msg,
        }) => Error::Protocol(format!(
            "Baidu TTS returned error {err_no}: {}",
            err_msg.unwrap_or_default()
        )),
        _ => Error::Protocol("Baidu TTS returned error instead of audio".to_string()),
    }
}
