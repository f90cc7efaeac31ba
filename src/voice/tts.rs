//! Speech dispatch across the configured synthesis backends
//!
//! The configured vendor is tried first. If a cloud vendor fails for any
//! reason the same text is spoken once by the local engine; that is the only
//! retry. Cloud audio goes through a temporary MP3 in the cache directory
//! that is removed when playback ends, is stopped, or fails to start.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::baidu::BaiduTts;
use super::local::{self, PlatformSpeech};
use super::playback::{AudioPlayer, Completion, PlaybackHandle, Stopper};
use super::tencent::TencentTts;
use super::token::TokenCache;
use crate::config::{Endpoints, TtsVendor, VoiceConfig};
use crate::Result;

/// Resolves when the spoken text has finished playing
pub type SpeechCompletion = Completion;

/// Routes `speak` calls to Tencent, Baidu or the local engine
pub struct SpeechDispatcher {
    config: VoiceConfig,
    tencent: TencentTts,
    baidu: BaiduTts,
    local: Arc<dyn PlatformSpeech>,
    player: Arc<dyn AudioPlayer>,
    cache_dir: PathBuf,
    current: Mutex<Option<Stopper>>,
}

impl SpeechDispatcher {
    pub fn new(
        config: VoiceConfig,
        client: reqwest::Client,
        endpoints: &Endpoints,
        tokens: Arc<TokenCache>,
        local: Arc<dyn PlatformSpeech>,
        player: Arc<dyn AudioPlayer>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            tencent: TencentTts::new(
                client.clone(),
                endpoints.tencent_tts.clone(),
                endpoints.tencent_region.clone(),
            ),
            baidu: BaiduTts::new(client, endpoints.baidu_tts.clone(), tokens),
            local,
            player,
            cache_dir: cache_dir.into(),
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn voice_config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn set_voice_config(&mut self, config: VoiceConfig) {
        self.config = config;
    }

    /// Speak `text` with the configured backend
    ///
    /// Returns once audio has started. Any previous speech is stopped first.
    /// When voice output is disabled nothing happens and the completion is
    /// already resolved.
    ///
    /// # Errors
    ///
    /// Cloud vendor errors are never returned; they trigger the local
    /// fallback instead. Returns the local engine's error if that fails.
    pub async fn speak(&self, text: &str) -> Result<SpeechCompletion> {
        if !self.config.enabled {
            tracing::debug!("voice output disabled");
            return Ok(Completion::done());
        }

        self.stop_speaking().await;

        let handle = match self.speak_with_configured(text).await {
            Ok(handle) => handle,
            Err(e) if self.config.provider != TtsVendor::Local => {
                tracing::warn!(
                    vendor = %self.config.provider,
                    error = %e,
                    "TTS failed, falling back to local speech"
                );
                local::speak_with(self.local.as_ref(), text, &self.config).await?
            }
            Err(e) => return Err(e),
        };

        let (stopper, completion) = handle.into_parts();
        *self.current.lock().await = Some(stopper);
        Ok(completion)
    }

    /// Stop any playing audio or local utterance; safe when idle
    pub async fn stop_speaking(&self) {
        if let Some(mut stopper) = self.current.lock().await.take() {
            stopper.stop();
        }
    }

    /// Whether speech started by this dispatcher is still playing
    pub async fn is_speaking(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(Stopper::is_active)
    }

    async fn speak_with_configured(&self, text: &str) -> Result<PlaybackHandle> {
        let vendor = self.config.provider;
        let audio = match vendor {
            TtsVendor::Local => {
                return local::speak_with(self.local.as_ref(), text, &self.config).await;
            }
            TtsVendor::Tencent => self.tencent.synthesize(text, &self.config).await?,
            TtsVendor::Baidu => match self.baidu.synthesize(text, &self.config).await? {
                Some(audio) => audio,
                None => return Ok(PlaybackHandle::finished()),
            },
        };

        self.play_audio(vendor, &audio).await
    }

    /// Write `audio` to a temporary file and play it
    async fn play_audio(&self, vendor: TtsVendor, audio: &[u8]) -> Result<PlaybackHandle> {
        let file = tempfile::Builder::new()
            .prefix(&format!("tts_{vendor}_"))
            .suffix(".mp3")
            .tempfile_in(&self.cache_dir)?;
        tokio::fs::write(file.path(), audio).await?;

        tracing::debug!(
            vendor = %vendor,
            player = self.player.name(),
            path = %file.path().display(),
            bytes = audio.len(),
            "playing synthesized audio"
        );

        // On error the file is dropped here and removed
        let handle = self.player.play(file.path()).await?;

        let (stopper, completion) = handle.into_parts();
        let (done, wrapped) = Completion::channel();
        tokio::spawn(async move {
            let result = completion.wait().await;
            if let Err(e) = file.close() {
                tracing::debug!(error = %e, "failed to remove temporary audio");
            }
            let _ = done.send(result);
        });

        Ok(PlaybackHandle::from_parts(stopper, wrapped))
    }
}
