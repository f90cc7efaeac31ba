//! Voice processing module
//!
//! Speech synthesis (Tencent, Baidu or the local engine), playback and
//! Baidu speech recognition. Baidu synthesis and recognition share one
//! [`TokenCache`].

pub mod baidu;
pub mod local;
pub mod playback;
pub mod stt;
pub mod tencent;
pub mod token;
pub mod tts;

pub use local::{EspeakSpeech, PlatformSpeech, SystemVoice, Utterance, VoiceQuality, select_voice};
#[cfg(feature = "speaker")]
pub use playback::SpeakerPlayer;
pub use playback::{AudioPlayer, CommandPlayer, Completion, PlaybackControl, PlaybackHandle, Stopper};
pub use stt::SpeechRecognizer;
pub use token::{CachedToken, TokenCache};
pub use tts::{SpeechCompletion, SpeechDispatcher};

/// Client id sent to Baidu with every request
pub(crate) const CUID: &str = "tour-guide";
