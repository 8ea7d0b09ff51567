//! Answer generation via a chat completion model.

use crate::config::GenerationSettings;
use crate::error::{RegQaError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::debug;

/// Trait for answer generation implementations.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for a fully rendered prompt.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Generator backed by the OpenAI chat completion API.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGenerator {
    pub fn new(settings: &GenerationSettings) -> Self {
        Self::with_timeout(settings, crate::openai::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(settings: &GenerationSettings, timeout: std::time::Duration) -> Self {
        Self {
            client: crate::openai::create_client(timeout),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| RegQaError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| RegQaError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| RegQaError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RegQaError::OpenAI(format!("Failed to generate answer: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| RegQaError::Generation("Empty response from model".to_string()))?
            .clone();

        debug!("Generated answer ({} chars)", answer.chars().count());
        Ok(answer)
    }
}
