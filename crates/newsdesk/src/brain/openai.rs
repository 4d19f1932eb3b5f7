//! OpenAI-compatible chat completions backend
//!
//! Works against OpenAI itself and any server speaking the same protocol
//! (Ollama's `/v1/chat/completions`, vLLM, LM Studio).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{BackendError, ChatMessage, GenerationBackend};

pub const OPENAI_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    base_backoff: Duration,
}

impl OpenAiCompatibleBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.base_backoff = base_backoff;
        self
    }

    fn is_local(&self) -> bool {
        self.endpoint.contains("localhost") || self.endpoint.contains("127.0.0.1")
    }
}

/// Pull `choices[0].message.content` out of a completion body
fn completion_text(json: &serde_json::Value) -> Result<String, BackendError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BackendError::Parse("response has no choices[0].message.content".to_string()))
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        if self.api_key.is_none() && !self.is_local() {
            return Err(BackendError::Config(format!(
                "no API key configured for {}",
                self.endpoint
            )));
        }

        let payload = serde_json::json!({
            "model": model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });

        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // 1x, 2x, 4x the base delay
                let delay = self.base_backoff * (1 << (attempt - 1));
                tracing::info!(
                    "[LLM_API] Retrying in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            let request = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json");
            let request = match &self.api_key {
                Some(key) => request.header("Authorization", format!("Bearer {}", key)),
                None => request,
            };

            let response = match request.json(&payload).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("[LLM_API] Request failed: {}", e);
                    last_error = Some(BackendError::RequestFailed(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let json: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Parse(e.to_string()))?;
                let content = completion_text(&json)?;
                tracing::debug!("[LLM_API] {} answered with {} chars", model, content.len());
                return Ok(content);
            }

            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 || status.is_server_error() {
                tracing::warn!(
                    "[LLM_API] Retryable error ({}): {}",
                    status,
                    body.chars().take(200).collect::<String>()
                );
                last_error = Some(BackendError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            tracing::error!("[LLM_API] API error ({}): {}", status, body);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Err(last_error.unwrap_or_else(|| BackendError::RequestFailed("max retries exceeded".to_string())))
    }
}
