//! Language model backends
//!
//! The generator and the LLM critic talk to a model through
//! [`GenerationBackend`], so tests and offline runs can swap in a scripted
//! implementation without touching the network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod openai;

pub use openai::{OpenAiCompatibleBackend, OPENAI_CHAT_ENDPOINT};

/// Error type for backend calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Strip code fences, then take the first `{` through the last `}`
pub(crate) fn extract_json_block(response: &str) -> &str {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        if let Some(start) = trimmed.find('\n') {
            let after_fence = &trimmed[start + 1..];
            if let Some(end) = after_fence.rfind("```") {
                return after_fence[..end].trim();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

/// A chat-completion capable model endpoint
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Complete a conversation with the given model, returning the raw text
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, BackendError>;
}
