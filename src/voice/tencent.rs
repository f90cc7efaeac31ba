//! Tencent Cloud text-to-speech (`TextToVoice`)

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::VoiceConfig;
use crate::signing::{self, SigningRequest};
use crate::{Error, Result};

const SERVICE: &str = "tts";
const ACTION: &str = "TextToVoice";
const VERSION: &str = "2019-08-23";
const CONTENT_TYPE: &str = "application/json";

/// Voice type used when the configured voice is not numeric
pub const DEFAULT_VOICE_TYPE: i64 = 1001;

const VOLUME: u8 = 5;
const SAMPLE_RATE: u32 = 16_000;

/// `TextToVoice` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextToVoiceRequest {
    pub text: String,
    pub session_id: String,
    pub voice_type: i64,
    pub speed: f32,
    pub volume: u8,
    pub codec: &'static str,
    pub sample_rate: u32,
}

impl TextToVoiceRequest {
    /// Build the request for `text`; `session_millis` names the session
    #[must_use]
    pub fn new(text: &str, config: &VoiceConfig, session_millis: i64) -> Self {
        Self {
            text: text.to_string(),
            session_id: format!("session-{session_millis}"),
            voice_type: config.numeric_voice(DEFAULT_VOICE_TYPE),
            speed: config.effective_rate(),
            volume: VOLUME,
            codec: "mp3",
            sample_rate: SAMPLE_RATE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Option<TextToVoiceResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TextToVoiceResponse {
    audio: Option<String>,
    error: Option<VendorError>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VendorError {
    code: String,
    message: String,
}

/// Client for Tencent Cloud TTS
pub struct TencentTts {
    client: reqwest::Client,
    endpoint: String,
    region: String,
}

impl TencentTts {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            region: region.into(),
        }
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if credentials are missing (no request is made)
    /// - [`Error::Network`] on a non-success status
    /// - [`Error::Tts`] if the vendor reports an error
    /// - [`Error::Protocol`] if the response carries no audio
    pub async fn synthesize(&self, text: &str, config: &VoiceConfig) -> Result<Vec<u8>> {
        let credentials = config.tencent_credentials()?;
        let host = self.host()?;

        let now = chrono::Utc::now();
        let request = TextToVoiceRequest::new(text, config, now.timestamp_millis());
        // Signed and sent bytes must be identical
        let body = serde_json::to_vec(&request)?;

        let headers = signing::sign(&SigningRequest {
            secret_id: credentials.secret_id.expose(),
            secret_key: credentials.secret_key.expose(),
            method: "POST",
            path: "/",
            content_type: CONTENT_TYPE,
            host: &host,
            service: SERVICE,
            action: ACTION,
            version: VERSION,
            region: &self.region,
            body: &body,
            timestamp: now.timestamp(),
        })?;

        tracing::info!(
            vendor = "tencent",
            voice_type = request.voice_type,
            chars = text.chars().count(),
            "requesting speech synthesis"
        );

        let response = headers
            .apply(self.client.post(&self.endpoint))
            .header("Content-Type", CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Error::from_response(response).await;
            tracing::error!(error = %error, "Tencent TTS error");
            return Err(error);
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("malformed Tencent TTS response: {e}")))?;

        let response = envelope
            .response
            .ok_or_else(|| Error::Protocol("Tencent TTS response has no Response".to_string()))?;

        if let Some(error) = response.error {
            tracing::error!(
                code = %error.code,
                request_id = response.request_id.as_deref().unwrap_or_default(),
                "Tencent TTS rejected request"
            );
            return Err(Error::Tts(format!("{}: {}", error.code, error.message)));
        }

        let audio = response
            .audio
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Protocol("no audio data in Tencent TTS response".to_string()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(audio.as_bytes())
            .map_err(|e| Error::Protocol(format!("invalid base64 audio: {e}")))?;

        tracing::debug!(bytes = bytes.len(), "Tencent audio received");
        Ok(bytes)
    }

    /// Host (with port when not default) of the endpoint, as signed
    fn host(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("invalid Tencent endpoint {}: {e}", self.endpoint)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("Tencent endpoint has no host: {}", self.endpoint)))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}
