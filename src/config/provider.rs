//! Chat/vision provider selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Secret;
use crate::{Error, Result};

/// Supported chat/vision language-model vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// `OpenAI`
    OpenAi,
    /// Moonshot (Kimi)
    Moonshot,
    /// Alibaba Qwen via the `DashScope` compatible endpoint
    Qwen,
    /// `DeepSeek`
    DeepSeek,
}

impl LlmProvider {
    /// All providers, in the order offered to users
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::Moonshot, Self::Qwen, Self::DeepSeek];

    /// Stable identifier used in persisted settings and on the CLI
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Moonshot => "moonshot",
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Base URL of the provider's OpenAI-compatible API
    #[must_use]
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Moonshot => "https://api.moonshot.cn/v1",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Moonshot => "moonshot-v1-8k-vision-preview",
            Self::Qwen => "qwen-vl-max",
            Self::DeepSeek => "deepseek-chat",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown LLM provider: {s}")))
    }
}

/// Credentials and endpoint selection for the chat/vision dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Selected vendor
    pub provider: LlmProvider,

    /// Bearer token for the vendor API
    pub api_key: Secret,

    /// Override for the vendor base URL
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Override for the model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderConfig {
    /// Create a config using the provider's default endpoint and model
    pub fn new(provider: LlmProvider, api_key: impl Into<Secret>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: None,
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Base URL to call, without a trailing slash
    #[must_use]
    pub fn resolved_base_url(&self) -> &str {
        non_blank(self.base_url.as_deref())
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    /// Model to request
    #[must_use]
    pub fn resolved_model(&self) -> &str {
        non_blank(self.model.as_deref()).unwrap_or_else(|| self.provider.default_model())
    }

    /// Check that a dispatch call can be made
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API key is empty
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_blank() {
            return Err(Error::Config(format!(
                "{} API key is not configured",
                self.provider
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
