//! Tour guide pipeline
//!
//! Ties chat, photo description, speech output and recognition together
//! around one conversation log. Only one request runs at a time; a second
//! submission while one is in flight fails with [`Error::Busy`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{Config, ProviderConfig, VoiceConfig};
use crate::llm::{ChatDispatcher, Role};
use crate::voice::{
    AudioPlayer, CommandPlayer, Completion, EspeakSpeech, PlatformSpeech, SpeechCompletion,
    SpeechDispatcher, SpeechRecognizer, TokenCache,
};
use crate::{Error, Location, Result};

/// Question recorded for a photo
pub const PHOTO_QUESTION: &str = "What is this?";

/// One message in the conversation log
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Photo the message refers to
    pub image: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            image: None,
            timestamp: Utc::now(),
        }
    }
}

/// An answer and its spoken playback
#[derive(Debug)]
pub struct GuideReply {
    pub text: String,
    /// Resolves when the spoken answer finishes
    pub speech: SpeechCompletion,
}

#[derive(Default)]
struct GuideState {
    conversation: Vec<ConversationEntry>,
    location: Option<Location>,
}

/// Resets the processing flag when a request ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The assistant: conversation state plus the chat, speech and recognition clients
pub struct TourGuide {
    chat: ChatDispatcher,
    speech: SpeechDispatcher,
    recognizer: SpeechRecognizer,
    state: Mutex<GuideState>,
    processing: AtomicBool,
}

impl TourGuide {
    pub fn new(chat: ChatDispatcher, speech: SpeechDispatcher, recognizer: SpeechRecognizer) -> Self {
        Self {
            chat,
            speech,
            recognizer,
            state: Mutex::new(GuideState::default()),
            processing: AtomicBool::new(false),
        }
    }

    /// Build a guide with the default local engine and audio player
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client or audio player cannot be set up
    pub fn from_config(config: &Config, provider: ProviderConfig, voice: VoiceConfig) -> Result<Self> {
        let client = config.http_client()?;
        let tokens = Arc::new(TokenCache::new(client.clone(), config.endpoints.baidu_token.clone()));
        let local: Arc<dyn PlatformSpeech> = Arc::new(EspeakSpeech::new(config.espeak_bin.clone()));
        let player = default_player(config)?;

        let chat = ChatDispatcher::new(client.clone(), provider).with_language(voice.language.clone());
        let recognizer = SpeechRecognizer::new(
            client.clone(),
            config.endpoints.baidu_asr.clone(),
            Arc::clone(&tokens),
        );
        let speech = SpeechDispatcher::new(
            voice,
            client,
            &config.endpoints,
            tokens,
            local,
            player,
            config.cache_dir.clone(),
        );

        Ok(Self::new(chat, speech, recognizer))
    }

    /// Whether a request is in flight
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Ask a question, record both sides and speak the answer
    ///
    /// The question is logged before the call and stays logged if it fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another request is running, or the chat error
    pub async fn ask(&self, question: &str) -> Result<GuideReply> {
        let _guard = self.begin()?;

        let (history, location) = {
            let mut state = self.state.lock().await;
            let history: Vec<String> = state.conversation.iter().map(|e| e.content.clone()).collect();
            state.conversation.push(ConversationEntry::new(Role::User, question));
            (history, state.location.clone())
        };

        let text = self.chat.chat(question, location.as_ref(), &history).await?;
        self.record_answer(&text).await;

        let speech = self.speak_answer(&text).await;
        Ok(GuideReply { text, speech })
    }

    /// Describe a photo (JPEG file), record it and speak the description
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another request is running, an IO error if
    /// the photo cannot be read, or the chat error
    pub async fn describe_photo(&self, photo: &Path) -> Result<GuideReply> {
        let _guard = self.begin()?;

        let jpeg = tokio::fs::read(photo).await?;
        let image = base64::engine::general_purpose::STANDARD.encode(&jpeg);

        let location = {
            let mut state = self.state.lock().await;
            let mut entry = ConversationEntry::new(Role::User, PHOTO_QUESTION);
            entry.image = Some(photo.to_path_buf());
            state.conversation.push(entry);
            state.location.clone()
        };

        let text = self.chat.analyze_image(&image, location.as_ref(), &[]).await?;
        self.record_answer(&text).await;

        let speech = self.speak_answer(&text).await;
        Ok(GuideReply { text, speech })
    }

    /// Transcribe a recorded question; nothing is sent or logged
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another request is running, or the
    /// recognition error
    pub async fn transcribe(&self, recording: &Path) -> Result<String> {
        let _guard = self.begin()?;
        self.recognizer
            .recognize(recording, self.speech.voice_config())
            .await
    }

    /// Speak arbitrary text with the configured voice
    ///
    /// # Errors
    ///
    /// Returns the local engine's error if every backend fails
    pub async fn speak(&self, text: &str) -> Result<SpeechCompletion> {
        self.speech.speak(text).await
    }

    pub async fn stop_speaking(&self) {
        self.speech.stop_speaking().await;
    }

    pub async fn is_speaking(&self) -> bool {
        self.speech.is_speaking().await
    }

    pub async fn clear_conversation(&self) {
        self.state.lock().await.conversation.clear();
    }

    pub async fn update_location(&self, location: Option<Location>) {
        self.state.lock().await.location = location;
    }

    pub async fn location(&self) -> Option<Location> {
        self.state.lock().await.location.clone()
    }

    /// Snapshot of the conversation log, oldest first
    pub async fn conversation(&self) -> Vec<ConversationEntry> {
        self.state.lock().await.conversation.clone()
    }

    fn begin(&self) -> Result<ProcessingGuard<'_>> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(ProcessingGuard(&self.processing))
    }

    async fn record_answer(&self, text: &str) {
        self.state
            .lock()
            .await
            .conversation
            .push(ConversationEntry::new(Role::Assistant, text));
    }

    /// Speech problems never fail a request that already has its answer
    async fn speak_answer(&self, text: &str) -> SpeechCompletion {
        match self.speech.speak(text).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(error = %e, "could not speak the answer");
                Completion::done()
            }
        }
    }
}

#[cfg(feature = "speaker")]
fn default_player(config: &Config) -> Result<Arc<dyn AudioPlayer>> {
    if config.player_command == "speaker" {
        return Ok(Arc::new(crate::voice::SpeakerPlayer));
    }
    Ok(Arc::new(CommandPlayer::from_command_line(&config.player_command)?))
}

#[cfg(not(feature = "speaker"))]
fn default_player(config: &Config) -> Result<Arc<dyn AudioPlayer>> {
    Ok(Arc::new(CommandPlayer::from_command_line(&config.player_command)?))
}
