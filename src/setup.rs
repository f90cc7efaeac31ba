//! Interactive settings wizard (`tour-guide setup`)

use dialoguer::{Confirm, Input, Select};

use crate::config::{
    BaiduCredentials, LlmProvider, ProviderConfig, Secret, TencentCredentials, TtsVendor,
    VoiceConfig,
};
use crate::db::SettingsStore;

/// Languages offered for replies and speech
const LANGUAGES: [&str; 8] = [
    "zh-CN", "zh-TW", "en-US", "ja-JP", "ko-KR", "es-ES", "fr-FR", "de-DE",
];

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or settings cannot be saved
pub fn run_setup(store: &SettingsStore) -> anyhow::Result<()> {
    println!("Tour Guide Setup\n");

    let existing_provider = store.provider_config()?;
    let existing_voice = store.voice_config()?.unwrap_or_default();

    let provider = prompt_provider(existing_provider.as_ref())?;
    store.save_provider_config(&provider)?;

    let voice = prompt_voice(&existing_voice)?;
    store.save_voice_config(&voice)?;

    println!("\nSettings saved.");
    println!("Run `tour-guide chat` to start a conversation.");

    Ok(())
}

fn prompt_provider(existing: Option<&ProviderConfig>) -> anyhow::Result<ProviderConfig> {
    // 1. Provider
    let labels: Vec<&str> = LlmProvider::ALL.iter().map(|p| p.as_str()).collect();
    let default_idx = existing
        .and_then(|c| LlmProvider::ALL.iter().position(|p| *p == c.provider))
        .unwrap_or(0);

    let idx = Select::new()
        .with_prompt("Select an LLM provider")
        .items(&labels)
        .default(default_idx)
        .interact()?;
    let provider = LlmProvider::ALL[idx];

    // 2. API key; only reused when the provider is unchanged
    let existing = existing.filter(|c| c.provider == provider);
    let api_key = prompt_secret(
        &format!("{provider} API key"),
        existing.map(|c| &c.api_key),
    )?;

    // 3. Base URL and model
    let base_url: String = Input::new()
        .with_prompt("Base URL")
        .default(
            existing
                .and_then(|c| c.base_url.clone())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
        )
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Model")
        .default(
            existing
                .and_then(|c| c.model.clone())
                .unwrap_or_else(|| provider.default_model().to_string()),
        )
        .interact_text()?;

    let mut config = ProviderConfig::new(provider, api_key);
    if base_url != provider.default_base_url() {
        config.base_url = Some(base_url);
    }
    if model != provider.default_model() {
        config.model = Some(model);
    }
    Ok(config)
}

fn prompt_voice(existing: &VoiceConfig) -> anyhow::Result<VoiceConfig> {
    let enabled = Confirm::new()
        .with_prompt("Speak answers aloud?")
        .default(existing.enabled)
        .interact()?;

    // Language is used for replies even with voice off
    let language_idx = Select::new()
        .with_prompt("Language")
        .items(&LANGUAGES)
        .default(
            LANGUAGES
                .iter()
                .position(|l| *l == existing.language)
                .unwrap_or(0),
        )
        .interact()?;
    let language = LANGUAGES[language_idx].to_string();

    if !enabled {
        return Ok(VoiceConfig {
            enabled,
            language,
            ..existing.clone()
        });
    }

    let labels: Vec<&str> = TtsVendor::ALL.iter().map(|v| v.as_str()).collect();
    let vendor_idx = Select::new()
        .with_prompt("Speech backend")
        .items(&labels)
        .default(
            TtsVendor::ALL
                .iter()
                .position(|v| *v == existing.provider)
                .unwrap_or(0),
        )
        .interact()?;
    let provider = TtsVendor::ALL[vendor_idx];

    let default_voice = if provider == existing.provider {
        existing.voice.clone()
    } else {
        provider.default_voice().to_string()
    };
    let voice: String = Input::new()
        .with_prompt("Voice")
        .default(default_voice)
        .interact_text()?;

    let rate: f32 = Input::new()
        .with_prompt("Speech rate (0.5 - 2.0)")
        .default(existing.rate)
        .validate_with(|r: &f32| {
            if (crate::config::MIN_RATE..=crate::config::MAX_RATE).contains(r) {
                Ok(())
            } else {
                Err("rate must be between 0.5 and 2.0")
            }
        })
        .interact_text()?;

    let pitch: f32 = Input::new()
        .with_prompt("Pitch")
        .default(existing.effective_pitch())
        .interact_text()?;

    let mut tencent = existing.tencent.clone();
    let mut baidu = existing.baidu.clone();

    if provider == TtsVendor::Tencent {
        tencent = Some(TencentCredentials {
            secret_id: prompt_secret(
                "Tencent Cloud SecretId",
                tencent.as_ref().map(|c| &c.secret_id),
            )?,
            secret_key: prompt_secret(
                "Tencent Cloud SecretKey",
                tencent.as_ref().map(|c| &c.secret_key),
            )?,
        });
    }

    // Baidu also powers speech recognition
    let want_baidu = provider == TtsVendor::Baidu
        || Confirm::new()
            .with_prompt("Configure Baidu credentials for speech recognition?")
            .default(baidu.is_some())
            .interact()?;

    if want_baidu {
        baidu = Some(BaiduCredentials {
            api_key: prompt_secret("Baidu API key", baidu.as_ref().map(|c| &c.api_key))?,
            secret_key: prompt_secret(
                "Baidu secret key",
                baidu.as_ref().map(|c| &c.secret_key),
            )?,
        });
    }

    Ok(VoiceConfig {
        enabled,
        provider,
        language,
        voice,
        rate,
        pitch: ((pitch - 1.0).abs() > f32::EPSILON).then_some(pitch),
        tencent,
        baidu,
    })
}

/// Ask for a secret, keeping the current one on blank input
fn prompt_secret(label: &str, current: Option<&Secret>) -> anyhow::Result<Secret> {
    let current = current.filter(|s| !s.is_blank());
    let prompt = current.map_or_else(
        || label.to_string(),
        |s| format!("{label} (current: {}, leave blank to keep)", s.masked()),
    );

    let input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;

    Ok(if input.trim().is_empty() {
        current.cloned().unwrap_or_default()
    } else {
        Secret::from(input.trim())
    })
}
