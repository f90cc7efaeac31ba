//! On-device speech synthesis
//!
//! The local backend needs no credentials or network. It is the default
//! vendor and the fallback when a cloud vendor fails.

use async_trait::async_trait;

use super::playback::{self, PlaybackHandle};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Default speaking rate of `espeak-ng` in words per minute
const ESPEAK_BASE_WPM: f32 = 175.0;

/// Voice quality tier reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceQuality {
    #[default]
    Default,
    Enhanced,
}

/// A voice installed on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemVoice {
    pub identifier: String,
    pub name: String,
    pub language: String,
    pub quality: VoiceQuality,
}

/// Parameters for one local utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    /// Identifier of the chosen voice; `None` lets the platform decide
    pub voice: Option<String>,
}

/// Platform speech engine
#[async_trait]
pub trait PlatformSpeech: Send + Sync {
    /// Installed voices
    ///
    /// # Errors
    ///
    /// Returns error if the voice list cannot be read
    async fn voices(&self) -> Result<Vec<SystemVoice>>;

    /// Start speaking, returning once speech has started
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot start
    async fn speak(&self, text: &str, utterance: &Utterance) -> Result<PlaybackHandle>;
}

/// Pick a voice for `language`
///
/// Voices match on the full tag or its primary subtag (`zh` for `zh-CN`).
/// Among matches an enhanced voice wins; otherwise the first match.
#[must_use]
pub fn select_voice<'a>(voices: &'a [SystemVoice], language: &str) -> Option<&'a SystemVoice> {
    let language = normalize_tag(language);
    let prefix = language.split('-').next().unwrap_or_default();

    let mut matching = voices.iter().filter(|v| {
        let tag = normalize_tag(&v.language);
        tag.starts_with(prefix) || tag.starts_with(&language)
    });

    let first = matching.next()?;
    if first.quality == VoiceQuality::Enhanced {
        return Some(first);
    }
    Some(
        matching
            .find(|v| v.quality == VoiceQuality::Enhanced)
            .unwrap_or(first),
    )
}

/// Speak `text` on `engine` using the voice settings
///
/// A failing voice listing is not fatal; the platform default voice is used.
///
/// # Errors
///
/// Returns error if the engine cannot start speaking
pub async fn speak_with(
    engine: &dyn PlatformSpeech,
    text: &str,
    config: &VoiceConfig,
) -> Result<PlaybackHandle> {
    let voices = engine.voices().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "could not list local voices");
        Vec::new()
    });

    let voice = select_voice(&voices, &config.language);
    if let Some(voice) = voice {
        tracing::debug!(voice = %voice.name, "using local voice");
    }

    let utterance = Utterance {
        language: config.language.clone(),
        rate: config.effective_rate(),
        pitch: config.effective_pitch(),
        voice: voice.map(|v| v.identifier.clone()),
    };

    tracing::info!(
        language = %utterance.language,
        rate = utterance.rate,
        "speaking with local engine"
    );
    engine.speak(text, &utterance).await
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_ascii_lowercase().replace('_', "-")
}

/// `espeak-ng` command-line synthesizer
#[derive(Debug, Clone)]
pub struct EspeakSpeech {
    program: String,
}

impl EspeakSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for an utterance
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn args(text: &str, utterance: &Utterance) -> Vec<String> {
        let voice = utterance
            .voice
            .clone()
            .unwrap_or_else(|| normalize_tag(&utterance.language));
        let wpm = (ESPEAK_BASE_WPM * utterance.rate).round().max(1.0) as u32;
        let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;

        vec![
            "-v".to_string(),
            voice,
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "--".to_string(),
            text.to_string(),
        ]
    }
}

impl Default for EspeakSpeech {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

#[async_trait]
impl PlatformSpeech for EspeakSpeech {
    async fn voices(&self) -> Result<Vec<SystemVoice>> {
        let output = tokio::process::Command::new(&self.program)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| Error::Audio(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(Error::Audio(format!(
                "{} --voices exited with {}",
                self.program, output.status
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&self, text: &str, utterance: &Utterance) -> Result<PlaybackHandle> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(Self::args(text, utterance));
        playback::spawn_process(command)
    }
}

/// Parse `espeak-ng --voices` output
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  cmn            --/M       Chinese_(Mandarin) sit/cmn       (zh-cmn 5)(zh 5)
/// ```
fn parse_voice_list(output: &str) -> Vec<SystemVoice> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [_, language, _, name, file, ..] = fields.as_slice() else {
                return None;
            };
            Some(SystemVoice {
                identifier: (*file).to_string(),
                name: name.replace('_', " "),
                language: (*language).to_string(),
                quality: VoiceQuality::Default,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, language: &str, quality: VoiceQuality) -> SystemVoice {
        SystemVoice {
            identifier: id.to_string(),
            name: id.to_string(),
            language: language.to_string(),
            quality,
        }
    }

    #[test]
    fn prefers_enhanced_match() {
        let voices = vec![
            voice("en-basic", "en-US", VoiceQuality::Default),
            voice("zh-basic", "zh-CN", VoiceQuality::Default),
            voice("zh-tw", "zh-TW", VoiceQuality::Default),
            voice("zh-premium", "zh-CN", VoiceQuality::Enhanced),
        ];
        let chosen = select_voice(&voices, "zh-CN").unwrap();
        assert_eq!(chosen.identifier, "zh-premium");
    }

    #[test]
    fn falls_back_to_first_match() {
        let voices = vec![
            voice("ja", "ja-JP", VoiceQuality::Enhanced),
            voice("en-gb", "en_GB", VoiceQuality::Default),
            voice("en-us", "en-US", VoiceQuality::Default),
        ];
        assert_eq!(select_voice(&voices, "en-US").unwrap().identifier, "en-gb");
        assert!(select_voice(&voices, "fr-FR").is_none());
        assert!(select_voice(&[], "zh-CN").is_none());
    }

    #[test]
    fn espeak_arguments() {
        let utterance = Utterance {
            language: "en-US".to_string(),
            rate: 1.5,
            pitch: 3.0,
            voice: None,
        };
        let args = EspeakSpeech::args("Hello", &utterance);
        assert_eq!(args, ["-v", "en-us", "-s", "263", "-p", "99", "--", "Hello"]);
    }

    #[test]
    fn voice_list_parsing() {
        let output = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  cmn             --/M      Chinese_(Mandarin) sit/cmn              (zh-cmn 5)(zh 5)
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";
        let voices = parse_voice_list(output);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1].identifier, "sit/cmn");
        assert_eq!(voices[1].name, "Chinese (Mandarin)");
        assert_eq!(voices[2].language, "en-us");
        assert_eq!(select_voice(&voices, "en-US").unwrap().identifier, "gmw/en-US");
    }
}
