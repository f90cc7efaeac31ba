//! Configuration management for the tour guide
//!
//! Runtime settings (paths, endpoints, audio tooling) come from the
//! environment, then `config.toml`, then defaults. Provider and voice
//! settings are user data and live in the settings store (see [`crate::db`]).

pub mod file;
mod provider;
mod secret;
mod voice;

use std::path::PathBuf;
use std::time::Duration;

pub use provider::{LlmProvider, ProviderConfig};
pub use secret::Secret;
pub use voice::{
    BaiduCredentials, MAX_RATE, MIN_RATE, TencentCredentials, TtsVendor, VoiceConfig,
};

use crate::Result;

/// Default player for synthesized MP3 audio
pub const DEFAULT_PLAYER: &str = "mpg123 -q";

/// Default HTTP timeout
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the settings database
    pub data_dir: PathBuf,

    /// Directory for temporary synthesized audio
    pub cache_dir: PathBuf,

    /// Vendor endpoints
    pub endpoints: Endpoints,

    /// Player command for synthesized audio
    pub player_command: String,

    /// `espeak-ng` binary used by the local speech backend
    pub espeak_bin: String,

    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
}

/// Speech vendor endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Tencent Cloud TTS API
    pub tencent_tts: String,

    /// Region sent in the `X-TC-Region` header
    pub tencent_region: String,

    /// Baidu OAuth token exchange
    pub baidu_token: String,

    /// Baidu text-to-speech
    pub baidu_tts: String,

    /// Baidu speech recognition
    pub baidu_asr: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            tencent_tts: "https://tts.tencentcloudapi.com".to_string(),
            tencent_region: "ap-guangzhou".to_string(),
            baidu_token: "https://aip.baidubce.com/oauth/2.0/token".to_string(),
            baidu_tts: "https://tsn.baidu.com/text2audio".to_string(),
            baidu_asr: "http://vop.baidu.com/server_api".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at a single base URL (mock servers)
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            tencent_tts: format!("{base}/tencent/tts"),
            tencent_region: "ap-guangzhou".to_string(),
            baidu_token: format!("{base}/oauth/2.0/token"),
            baidu_tts: format!("{base}/text2audio"),
            baidu_asr: format!("{base}/server_api"),
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the data or cache directory cannot be created
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        // Data dir (~/.local/share/tour-guide on Linux)
        let data_dir = std::env::var("TOUR_GUIDE_DATA_DIR")
            .ok()
            .or(fc.paths.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        // Cache dir (~/.cache/tour-guide/audio on Linux)
        let cache_dir = std::env::var("TOUR_GUIDE_CACHE_DIR")
            .ok()
            .or(fc.paths.cache_dir)
            .map_or_else(default_cache_dir, PathBuf::from);

        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(&cache_dir)?;

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            tencent_tts: fc.endpoints.tencent_tts.unwrap_or(defaults.tencent_tts),
            tencent_region: fc
                .endpoints
                .tencent_region
                .unwrap_or(defaults.tencent_region),
            baidu_token: fc.endpoints.baidu_token.unwrap_or(defaults.baidu_token),
            baidu_tts: fc.endpoints.baidu_tts.unwrap_or(defaults.baidu_tts),
            baidu_asr: fc.endpoints.baidu_asr.unwrap_or(defaults.baidu_asr),
        };

        let player_command = std::env::var("TOUR_GUIDE_PLAYER")
            .ok()
            .or(fc.audio.player)
            .unwrap_or_else(|| DEFAULT_PLAYER.to_string());

        let espeak_bin = std::env::var("TOUR_GUIDE_ESPEAK_BIN")
            .ok()
            .or(fc.audio.espeak_bin)
            .unwrap_or_else(|| "espeak-ng".to_string());

        let http_timeout = std::env::var("TOUR_GUIDE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.http.timeout_secs)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);

        Ok(Self {
            data_dir,
            cache_dir,
            endpoints,
            player_command,
            espeak_bin,
            http_timeout,
        })
    }

    /// Path to the settings database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }

    /// Build the shared HTTP client
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("tour-guide/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }

    /// Provider configuration from `TOUR_GUIDE_*` environment variables
    ///
    /// Returns `None` unless both `TOUR_GUIDE_PROVIDER` and `TOUR_GUIDE_API_KEY` are set.
    ///
    /// # Errors
    ///
    /// Returns error if the provider name is unknown
    pub fn provider_from_env() -> Result<Option<ProviderConfig>> {
        let (Ok(provider), Ok(api_key)) = (
            std::env::var("TOUR_GUIDE_PROVIDER"),
            std::env::var("TOUR_GUIDE_API_KEY"),
        ) else {
            return Ok(None);
        };

        let mut config = ProviderConfig::new(provider.parse()?, api_key);
        config.base_url = std::env::var("TOUR_GUIDE_BASE_URL").ok();
        config.model = std::env::var("TOUR_GUIDE_MODEL").ok();
        Ok(Some(config))
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/tour-guide"),
        |d| d.data_dir().join("tour-guide"),
    )
}

fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".cache/tour-guide/audio"),
        |d| d.cache_dir().join("tour-guide").join("audio"),
    )
}
