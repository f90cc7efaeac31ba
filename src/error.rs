//! Error types for the tour guide

use thiserror::Error;

/// Result type alias for tour guide operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching chat, speech and recognition calls
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (raised before any network call)
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote API answered with a non-success status
    #[error("API request failed with status {status}: {body}")]
    Network {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the vendor
        body: String,
    },

    /// Response shape violates the expected schema
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Token exchange rejected the credentials
    #[error("auth error: {0}")]
    Auth(String),

    /// Speech recognition failed or produced no text
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Text-to-speech vendor reported an error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio playback or local synthesis error
    #[error("audio error: {0}")]
    Audio(String),

    /// Another request is still being processed
    #[error("a request is already being processed")]
    Busy,

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Build a [`Error::Network`] from a failed response, consuming its body
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Network { status, body }
    }
}
