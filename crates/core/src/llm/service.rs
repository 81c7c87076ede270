//! Language model service - `call(prompt, system_context) -> text`
//!
//! The extraction and explanation stages only see this trait. One attempt
//! per call; callers bound it with their own timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::provider::{CompletionRequest, LlmProvider, Message, ProviderError};

/// Prefix for the system message carrying knowledge context
pub const CONTEXT_PREFIX: &str = "基于以下知识库信息回答问题：\n";

/// Free-text completion capability
#[async_trait]
pub trait LanguageModelService: Send + Sync {
    async fn call(&self, prompt: &str, system_context: &str) -> Result<String, ProviderError>;
}

/// Shared service reference
pub type SharedLanguageModel = Arc<dyn LanguageModelService>;

/// Adapts an [`LlmProvider`] into a [`LanguageModelService`]
pub struct ChatCompletionService {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionService {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, prompt: &str, system_context: &str) -> CompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_context.trim().is_empty() {
            messages.push(Message::system(format!("{}{}", CONTEXT_PREFIX, system_context)));
        }
        messages.push(Message::user(prompt));

        CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }
}

impl std::fmt::Debug for ChatCompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionService")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LanguageModelService for ChatCompletionService {
    async fn call(&self, prompt: &str, system_context: &str) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, system_context);
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = request.messages.len(),
            "Calling language model"
        );

        let response = self.provider.complete(&request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Api {
                message: "response contained no choices".to_string(),
                status_code: None,
            })
    }
}

/// Canned language model for tests and offline runs
#[derive(Debug, Clone)]
pub struct ScriptedLanguageModel {
    reply: Result<String, String>,
    delay: Option<Duration>,
}

impl ScriptedLanguageModel {
    /// Always answer with `reply`
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            delay: None,
        }
    }

    /// Always fail with an API error carrying `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            delay: None,
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl LanguageModelService for ScriptedLanguageModel {
    async fn call(&self, _prompt: &str, _system_context: &str) -> Result<String, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().map_err(|message| ProviderError::Api {
            message,
            status_code: Some(500),
        })
    }
}
