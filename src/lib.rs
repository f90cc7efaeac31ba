//! Tour Guide - request dispatch and credentials for a travel assistant
//!
//! This library provides the core functionality behind the `tour-guide` CLI:
//! - Chat and photo questions to OpenAI-compatible providers
//! - Speech output through Tencent Cloud, Baidu or the local engine
//! - Baidu speech recognition with a shared OAuth token cache
//! - TC3-HMAC-SHA256 request signing
//! - Persisted provider and voice settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     TourGuide                        │
//! │   ask  │  describe_photo  │  transcribe  │  speak    │
//! └──────┬──────────────┬──────────────────┬────────────┘
//!        │              │                  │
//! ┌──────▼──────┐ ┌─────▼──────────┐ ┌─────▼────────────┐
//! │ ChatDispatch│ │SpeechDispatcher│ │ SpeechRecognizer │
//! │  (LLM APIs) │ │Tencent│Baidu│local│ │     (Baidu)      │
//! └─────────────┘ └──┬──────┬──────┘ └─────┬────────────┘
//!                    │      └──────┬───────┘
//!              TC3 signing    TokenCache
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod guide;
pub mod llm;
pub mod location;
pub mod setup;
pub mod signing;
pub mod voice;

pub use config::{Config, LlmProvider, ProviderConfig, Secret, TtsVendor, VoiceConfig};
pub use db::{DbConn, DbPool, SettingsStore};
pub use error::{Error, Result};
pub use guide::{ConversationEntry, GuideReply, TourGuide};
pub use llm::ChatDispatcher;
pub use location::Location;
pub use voice::{SpeechCompletion, SpeechDispatcher, SpeechRecognizer, TokenCache};
