//! Chat-completions reply generator.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::generate::{GenerationError, ReplyGenerator};
use super::policy::tone;
use crate::classify::Category;

/// Default chat-completions endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    /// Creates a generator with the default endpoint and model.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Failed` if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::Failed("API key is empty".into()));
        }
        Ok(Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            url: DEFAULT_OPENAI_URL.to_string(),
            api_key,
            model: DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn request_messages(content: &str, label: Category) -> [ChatMessage; 2] {
    [
        ChatMessage {
            role: "system",
            content: format!(
                "You are an email assistant. Generate a concise, {} reply under 100 words.",
                tone(label)
            ),
        },
        ChatMessage {
            role: "user",
            content: format!("Email content:\n{content}\n\nReply draft:"),
        },
    ]
}

fn is_rate_limited(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("rate_limit_exceeded")
}

#[async_trait]
impl ReplyGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, content: &str, label: Category) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: request_messages(content, label),
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if is_rate_limited(status, &body) {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            return Err(GenerationError::Failed(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Failed(format!("bad response JSON: {e}")))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(model = %self.model, chars = text.len(), "Generated reply text");
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        assert!(OpenAiGenerator::new("  ").is_err());
        assert!(OpenAiGenerator::new("sk-test").is_ok());
    }

    #[test]
    fn test_prompt_tone_follows_label() {
        let [system, user] = request_messages("Lunch?", Category::Business);
        assert!(system.content.contains("concise, professional reply under 100 words"));
        assert_eq!(user.content, "Email content:\nLunch?\n\nReply draft:");

        let [system, _] = request_messages("Lunch?", Category::Personal);
        assert!(system.content.contains("friendly"));
    }

    #[test]
    fn test_rate_limit_detection() {
        use reqwest::StatusCode;

        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"rate_limit_exceeded"}}"#
        ));
        assert!(!is_rate_limited(StatusCode::UNAUTHORIZED, "invalid key"));
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hi there")
        );
        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }
}
