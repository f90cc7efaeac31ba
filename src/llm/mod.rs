//! Chat and vision dispatch to OpenAI-compatible providers

mod message;
pub mod prompt;

pub use message::{ChatMessage, ContentPart, ImageUrl, MessageContent, Role};

use message::{ChatCompletionRequest, ChatCompletionResponse};

use crate::config::ProviderConfig;
use crate::{Error, Location, Result};

/// Token limit for both chat and image replies
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Sends tour-guide conversations to the configured provider
pub struct ChatDispatcher {
    client: reqwest::Client,
    config: ProviderConfig,
    language: Option<String>,
}

impl ChatDispatcher {
    /// Create a dispatcher for a provider configuration
    #[must_use]
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            language: None,
        }
    }

    /// Set the language replies should be written in (from the voice settings)
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Replace the reply language
    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    /// Replace the provider configuration
    pub fn set_config(&mut self, config: ProviderConfig) {
        self.config = config;
    }

    /// Current provider configuration
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Answer a text question
    ///
    /// `history` holds previous message texts, oldest first; only the last
    /// six are sent, alternating user/assistant from the oldest one.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is not configured or the call fails
    pub async fn chat(
        &self,
        message: &str,
        location: Option<&Location>,
        history: &[String],
    ) -> Result<String> {
        let messages = self.chat_messages(message, location, history);
        self.call_api(&messages, DEFAULT_MAX_TOKENS).await
    }

    /// Describe a photo (base64-encoded JPEG)
    ///
    /// # Errors
    ///
    /// Returns error if the provider is not configured or the call fails
    pub async fn analyze_image(
        &self,
        image_base64: &str,
        location: Option<&Location>,
        history: &[String],
    ) -> Result<String> {
        let messages = self.vision_messages(image_base64, location, history);
        self.call_api(&messages, DEFAULT_MAX_TOKENS).await
    }

    /// Messages for a text chat: system prompt, trailing history, new message
    #[must_use]
    pub fn chat_messages(
        &self,
        message: &str,
        location: Option<&Location>,
        history: &[String],
    ) -> Vec<ChatMessage> {
        let recent = prompt::last_n(history, prompt::CHAT_HISTORY_TURNS);
        let mut messages = Vec::with_capacity(recent.len() + 2);

        messages.push(ChatMessage::text(
            Role::System,
            prompt::chat_system_prompt(self.language.as_deref(), location),
        ));

        for (idx, turn) in recent.iter().enumerate() {
            let role = if idx % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            messages.push(ChatMessage::text(role, turn.clone()));
        }

        messages.push(ChatMessage::text(Role::User, message));
        messages
    }

    /// Messages for an image question
    ///
    /// A single user message with the image first and the text second; some
    /// vision models reject the reverse order or a separate system message.
    #[must_use]
    pub fn vision_messages(
        &self,
        image_base64: &str,
        location: Option<&Location>,
        history: &[String],
    ) -> Vec<ChatMessage> {
        vec![ChatMessage::parts(
            Role::User,
            vec![
                ContentPart::jpeg_base64(image_base64),
                ContentPart::text(prompt::vision_prompt(
                    self.language.as_deref(),
                    location,
                    history,
                )),
            ],
        )]
    }

    /// Call `{base_url}/chat/completions` and return the first choice's text
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the API key is empty (no request is made)
    /// - [`Error::Network`] on a non-success status
    /// - [`Error::Protocol`] if the reply has no `choices[0].message.content`
    pub async fn call_api(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        self.config.validate()?;

        let base_url = self.config.resolved_base_url();
        let model = self.config.resolved_model();

        tracing::info!(provider = %self.config.provider, base_url, model, "calling chat completions");
        if tracing::enabled!(tracing::Level::DEBUG) {
            let logged: Vec<ChatMessage> = messages.iter().map(ChatMessage::redacted).collect();
            tracing::debug!(
                messages = %serde_json::to_string(&logged).unwrap_or_default(),
                "chat request"
            );
        }

        let request = ChatCompletionRequest {
            model,
            messages,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{base_url}/chat/completions"))
            .bearer_auth(self.config.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat request failed");
                e
            })?;

        if !response.status().is_success() {
            let error = Error::from_response(response).await;
            tracing::error!(error = %error, "chat API error");
            return Err(error);
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat response");
            Error::Protocol(format!("malformed chat completion response: {e}"))
        })?;

        let content = result.into_content().ok_or_else(|| {
            Error::Protocol("chat completion response has no message content".to_string())
        })?;

        tracing::debug!(chars = content.chars().count(), "chat reply received");
        Ok(content)
    }
}
