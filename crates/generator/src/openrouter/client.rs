use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemaforge_core::{PhaseContext, PhaseId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::types::*;
use crate::error::{GeneratorError, Result};
use crate::Generator;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(0.4),
            max_tokens: Some(4000),
        }
    }
}

impl OpenRouterConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Generator backed by an OpenRouter-compatible `/chat/completions` endpoint.
///
/// One call per `invoke`; retries belong to the caller.
#[derive(Clone)]
pub struct OpenRouterGenerator {
    client: Client,
    api_key: String,
    config: OpenRouterConfig,
}

impl OpenRouterGenerator {
    pub fn new(api_key: impl Into<String>, config: OpenRouterConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeneratorError::Configuration("API key is empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(GeneratorError::Configuration("model is empty".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            config,
        })
    }

    pub fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    fn build_messages(phase: PhaseId, context: &PhaseContext) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(format!(
                "Produce the \"{}\" part of a database design. Reply with the content only.",
                phase.title()
            )),
            ChatMessage::user(context.to_payload().to_string()),
        ]
    }

    async fn chat_completion(&self, messages: Vec<ChatMessage>, timeout: Duration) -> Result<String> {
        debug!(
            "Creating chat completion with {} messages, model {}",
            messages.len(),
            self.config.model
        );

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: Some(false),
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenRouterError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            if status.as_u16() == 429 {
                warn!(retry_after = ?retry_after, "Rate limited by OpenRouter");
            } else {
                error!(status = status.as_u16(), "OpenRouter API error: {}", message);
            }

            return Err(match GeneratorError::from_status(status.as_u16(), message, retry_after) {
                GeneratorError::Timeout { .. } => GeneratorError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                },
                other => other,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e, timeout))?;
        let chat_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| GeneratorError::InvalidResponse(format!("Failed to decode completion: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GeneratorError::InvalidResponse("No completion returned".to_string()))?;

        if content.trim().is_empty() {
            return Err(GeneratorError::InvalidResponse("Empty completion".to_string()));
        }

        Ok(content)
    }
}

fn classify_transport(err: reqwest::Error, timeout: Duration) -> GeneratorError {
    if err.is_timeout() {
        GeneratorError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else if err.is_builder() {
        GeneratorError::Configuration(err.to_string())
    } else {
        GeneratorError::Network(err.to_string())
    }
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn invoke(
        &self,
        phase: PhaseId,
        context: &PhaseContext,
        timeout: Duration,
    ) -> Result<String> {
        let messages = Self::build_messages(phase, context);
        self.chat_completion(messages, timeout).await
    }
}
