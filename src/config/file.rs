//! TOML configuration file loading
//!
//! Supports `~/.config/tour-guide/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GuideConfigFile {
    /// Storage locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Vendor endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// Local audio tooling
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpFileConfig,
}

/// Storage locations
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    /// Directory holding the settings database
    pub data_dir: Option<String>,

    /// Directory for temporary synthesized audio
    pub cache_dir: Option<String>,
}

/// Vendor endpoint overrides (proxies, testing)
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsFileConfig {
    pub tencent_tts: Option<String>,
    pub tencent_region: Option<String>,
    pub baidu_token: Option<String>,
    pub baidu_tts: Option<String>,
    pub baidu_asr: Option<String>,
}

/// Local audio tooling
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Player command for synthesized audio, e.g. `mpg123 -q`
    pub player: Option<String>,

    /// Path to the `espeak-ng` binary
    pub espeak_bin: Option<String>,
}

/// HTTP client settings
#[derive(Debug, Default, Deserialize)]
pub struct HttpFileConfig {
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GuideConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GuideConfigFile {
    let Some(path) = config_file_path() else {
        return GuideConfigFile::default();
    };

    if !path.exists() {
        return GuideConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GuideConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GuideConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<GuideConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/tour-guide/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tour-guide").join("config.toml"))
}
