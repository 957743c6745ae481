//! OpenAI-compatible chat completion client used to write image prompts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{endpoint, http_client, snippet};
use crate::config::TextGenerationConfig;
use crate::error::{PipelineError, Stage};

/// Why a prompt could not be produced by the text generation service.
#[derive(Debug)]
pub enum TextGenerationError {
    /// No credential configured
    NotConfigured,
    /// The call exceeded its deadline
    Timeout,
    /// Connection or protocol failure
    Transport(String),
    /// Non-2xx response
    Status(u16, String),
    /// 2xx response without usable content
    Malformed(String),
}

impl std::fmt::Display for TextGenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "text generation is not configured"),
            Self::Timeout => write!(f, "timed out waiting for {}", Stage::TextGeneration),
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
            Self::Status(code, body) => write!(f, "API error {code}: {body}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TextGenerationError {}

impl From<reqwest::Error> for TextGenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client for the prompt writer.
#[derive(Clone, Debug)]
pub struct TextGenerationClient {
    config: TextGenerationConfig,
    client: reqwest::Client,
}

impl TextGenerationClient {
    /// Creates a client; no request is made until [`Self::complete`].
    pub fn new(config: &TextGenerationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            config: config.clone(),
            client: http_client(config.timeout)?,
        })
    }

    /// True when a credential is configured.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Sends a system + user message pair and returns the first reply, trimmed.
    pub async fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
    ) -> Result<String, TextGenerationError> {
        let Some(api_key) = self.config.api_key.as_ref() else {
            return Err(TextGenerationError::NotConfigured);
        };
        let url = endpoint(&self.config.base_url, "chat/completions")
            .map_err(|err| TextGenerationError::Transport(err.to_string()))?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
        };

        debug!("Requesting image prompt from {}", url);
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(TextGenerationError::Status(status.as_u16(), snippet(&bytes)));
        }

        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|err| TextGenerationError::Malformed(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| TextGenerationError::Malformed("no message content".to_string()))
    }
}
