//! Speech recognition through Baidu's short-speech API

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::CUID;
use super::token::TokenCache;
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Sample rate the recognizer is told the audio has
pub const SAMPLE_RATE: u32 = 16_000;

/// Mandarin model
const DEV_PID_MANDARIN: u32 = 1537;
/// English model
const DEV_PID_ENGLISH: u32 = 1737;

#[derive(Debug, Serialize)]
struct RecognitionRequest<'a> {
    format: &'static str,
    rate: u32,
    channel: u16,
    cuid: &'static str,
    token: &'a str,
    dev_pid: u32,
    speech: String,
    len: usize,
}

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    err_no: Option<i64>,
    err_msg: Option<String>,
    #[serde(default)]
    result: Vec<String>,
}

impl RecognitionResponse {
    /// First transcript; a missing or non-zero `err_no` is a failure
    fn into_transcript(self) -> Result<String> {
        let Some(err_no) = self.err_no else {
            tracing::error!("recognition response has no err_no");
            return Err(Error::Recognition(
                "speech recognition response carried no status".to_string(),
            ));
        };

        if err_no != 0 {
            let message = self.err_msg.unwrap_or_default();
            tracing::error!(err_no, err_msg = %message, "recognition failed");
            return Err(Error::Recognition(format!(
                "speech recognition failed ({err_no}): {message}"
            )));
        }

        self.result
            .into_iter()
            .next()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Recognition("no speech recognized".to_string()))
    }
}

/// Transcribes recorded WAV files
pub struct SpeechRecognizer {
    client: reqwest::Client,
    endpoint: String,
    tokens: Arc<TokenCache>,
}

impl SpeechRecognizer {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, tokens: Arc<TokenCache>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            tokens,
        }
    }

    /// Transcribe a WAV file (16 kHz mono expected)
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if Baidu credentials are missing (no request is made)
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Recognition`] if the vendor reports an error or no text
    pub async fn recognize(&self, audio: &Path, config: &VoiceConfig) -> Result<String> {
        config.baidu_credentials()?;
        let bytes = tokio::fs::read(audio).await?;
        self.recognize_bytes(&bytes, config).await
    }

    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// See [`SpeechRecognizer::recognize`]
    pub async fn recognize_bytes(&self, audio: &[u8], config: &VoiceConfig) -> Result<String> {
        let credentials = config.baidu_credentials()?;
        check_wav_format(audio);

        let token = self.tokens.get_token(credentials).await?;
        let dev_pid = if config.is_chinese() {
            DEV_PID_MANDARIN
        } else {
            DEV_PID_ENGLISH
        };

        tracing::debug!(audio_bytes = audio.len(), dev_pid, "starting recognition");

        let request = RecognitionRequest {
            format: "wav",
            rate: SAMPLE_RATE,
            channel: 1,
            cuid: CUID,
            token: &token,
            dev_pid,
            speech: base64::engine::general_purpose::STANDARD.encode(audio),
            len: audio.len(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "recognition request failed");
                e
            })?;

        if !response.status().is_success() {
            let error = Error::from_response(response).await;
            tracing::error!(error = %error, "recognition API error");
            return Err(error);
        }

        let result: RecognitionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse recognition response");
            Error::Protocol(format!("malformed recognition response: {e}"))
        })?;

        let transcript = result.into_transcript()?;

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// Warn when the audio is not the 16 kHz mono WAV the API is told to expect
fn check_wav_format(audio: &[u8]) {
    match hound::WavReader::new(Cursor::new(audio)) {
        Ok(reader) => {
            let spec = reader.spec();
            if spec.sample_rate != SAMPLE_RATE || spec.channels != 1 {
                tracing::warn!(
                    sample_rate = spec.sample_rate,
                    channels = spec.channels,
                    "audio is not 16 kHz mono; recognition may fail"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "audio is not a readable WAV file"),
    }
}
