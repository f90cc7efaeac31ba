//! Prompt text for the tour-guide persona

use crate::Location;

/// Number of history entries carried into a text chat
pub const CHAT_HISTORY_TURNS: usize = 6;

/// Number of history entries quoted in an image prompt
pub const VISION_HISTORY_TURNS: usize = 3;

const CHAT_PERSONA: &str = "You are a knowledgeable and friendly tour guide. Answer questions about \
    locations, provide recommendations, and help travelers plan their visits.";

const VISION_PERSONA: &str = "You are a knowledgeable and friendly tour guide. Provide engaging, \
    informative commentary about landmarks, buildings, and scenery. Keep responses concise but \
    interesting.";

const VISION_QUESTION: &str = "What can you tell me about what you see in this image?";

const DEFAULT_DIRECTIVE: &str = "Please respond in Chinese (中文).";

/// Instruction telling the model which language to answer in
///
/// Unknown or missing tags fall back to Chinese.
#[must_use]
pub fn language_directive(language: Option<&str>) -> &'static str {
    match language.map(str::trim) {
        Some("zh-TW") => "Please respond in Traditional Chinese (繁體中文).",
        Some("en-US") => "Please respond in English.",
        Some("ja-JP") => "Please respond in Japanese (日本語).",
        Some("ko-KR") => "Please respond in Korean (한국어).",
        Some("es-ES") => "Please respond in Spanish (Español).",
        Some("fr-FR") => "Please respond in French (Français).",
        Some("de-DE") => "Please respond in German (Deutsch).",
        // zh-CN and everything unrecognized
        _ => DEFAULT_DIRECTIVE,
    }
}

/// System message for a text chat
#[must_use]
pub fn chat_system_prompt(language: Option<&str>, location: Option<&Location>) -> String {
    let context = location.map(Location::context_line).unwrap_or_default();
    format!(
        "{CHAT_PERSONA} {}\n{context}",
        language_directive(language)
    )
}

/// Combined instruction and context for an image question
#[must_use]
pub fn vision_prompt(
    language: Option<&str>,
    location: Option<&Location>,
    history: &[String],
) -> String {
    let context = location.map(Location::context_line).unwrap_or_default();
    let recent = last_n(history, VISION_HISTORY_TURNS);
    let history_context = if recent.is_empty() {
        String::new()
    } else {
        format!("Recent conversation:\n{}", recent.join("\n"))
    };

    format!(
        "{VISION_PERSONA} {}\n\n{context}\n{history_context}\n\n{VISION_QUESTION}",
        language_directive(language)
    )
}

/// The trailing `n` entries, oldest first
#[must_use]
pub fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
