//! Speech synthesis and recognition settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Secret;
use crate::{Error, Result};

/// Slowest accepted speech rate
pub const MIN_RATE: f32 = 0.5;

/// Fastest accepted speech rate
pub const MAX_RATE: f32 = 2.0;

/// Speech synthesis backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsVendor {
    /// On-device synthesis, no credentials required
    #[default]
    #[serde(alias = "expo-speech", alias = "local-tts")]
    Local,
    /// Tencent Cloud TTS (TC3 request signing)
    Tencent,
    /// Baidu TTS (OAuth bearer token)
    Baidu,
}

impl TtsVendor {
    /// All backends, in the order offered to users
    pub const ALL: [Self; 3] = [Self::Local, Self::Tencent, Self::Baidu];

    /// Stable identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Tencent => "tencent",
            Self::Baidu => "baidu",
        }
    }

    /// Voice used when the configured one does not apply to this backend
    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::Local => "zh-CN-XiaoxiaoNeural",
            Self::Tencent => "1001",
            Self::Baidu => "0",
        }
    }
}

impl fmt::Display for TtsVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsVendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local-tts" | "expo-speech" => Ok(Self::Local),
            "tencent" => Ok(Self::Tencent),
            "baidu" => Ok(Self::Baidu),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Tencent Cloud API credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TencentCredentials {
    pub secret_id: Secret,
    pub secret_key: Secret,
}

/// Baidu AI platform credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaiduCredentials {
    pub api_key: Secret,
    pub secret_key: Secret,
}

/// Voice output and input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Speak replies at all
    pub enabled: bool,

    /// Synthesis backend
    pub provider: TtsVendor,

    /// Language tag, e.g. `zh-CN` or `en-US`
    pub language: String,

    /// Backend-specific voice: a voice name for the local backend, a numeric
    /// voice type for Tencent, a numeric persona id for Baidu
    pub voice: String,

    /// Speech rate multiplier, 0.5 to 2.0
    pub rate: f32,

    /// Optional pitch multiplier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tencent: Option<TencentCredentials>,

    /// Baidu credentials, also used for speech recognition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baidu: Option<BaiduCredentials>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: TtsVendor::Local,
            language: "zh-CN".to_string(),
            voice: TtsVendor::Local.default_voice().to_string(),
            rate: 1.0,
            pitch: None,
            tencent: None,
            baidu: None,
        }
    }
}

impl VoiceConfig {
    /// Rate clamped into the accepted range
    #[must_use]
    pub fn effective_rate(&self) -> f32 {
        if self.rate.is_finite() {
            self.rate.clamp(MIN_RATE, MAX_RATE)
        } else {
            1.0
        }
    }

    /// Pitch, defaulting to 1.0
    #[must_use]
    pub fn effective_pitch(&self) -> f32 {
        self.pitch.filter(|p| p.is_finite()).unwrap_or(1.0)
    }

    /// Whether the language is a Chinese variant
    #[must_use]
    pub fn is_chinese(&self) -> bool {
        self.language.starts_with("zh")
    }

    /// Parse the voice field as a numeric id, falling back to `default`
    #[must_use]
    pub fn numeric_voice(&self, default: i64) -> i64 {
        self.voice.trim().parse().unwrap_or(default)
    }

    /// Tencent credentials, required for the Tencent backend
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either value is missing
    pub fn tencent_credentials(&self) -> Result<&TencentCredentials> {
        self.tencent
            .as_ref()
            .filter(|c| !c.secret_id.is_blank() && !c.secret_key.is_blank())
            .ok_or_else(|| Error::Config("Tencent Cloud credentials not configured".to_string()))
    }

    /// Baidu credentials, required for Baidu synthesis and recognition
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either value is missing
    pub fn baidu_credentials(&self) -> Result<&BaiduCredentials> {
        self.baidu
            .as_ref()
            .filter(|c| !c.api_key.is_blank() && !c.secret_key.is_blank())
            .ok_or_else(|| Error::Config("Baidu credentials not configured".to_string()))
    }
}
