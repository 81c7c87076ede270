//! LLM Provider Abstraction
//!
//! Responsibilities:
//! - Unified Provider trait for chat-completion backends
//! - Common request/response types
//! - HTTP error mapping

pub mod openai;

pub use openai::{create_openai_config, OpenAiProvider};

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-specific errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Network error: {source}")]
    Network { source: reqwest::Error },

    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },
}

/// Chat role as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, deserialize_with = "deserialize_message_content")]
    pub content: String,
}

impl Message {
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
}

fn deserialize_message_content<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let content = Option::<String>::deserialize(deserializer)?;
    Ok(content.unwrap_or_default())
}

/// Complete request to LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Chat-completions response. Only the choices are read; usage and ids
/// are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Choice in response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,
    pub message: Message,
    pub finish_reason: Option<String>,
}

/// Provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: String,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &crate::config::mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Complete a request (non-streaming)
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get configuration
    fn config(&self) -> &ProviderConfig;
}

/// Convert provider error from external error
pub fn map_provider_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 => ProviderError::Auth {
                message: "Invalid API key".to_string(),
            },
            403 => ProviderError::Auth {
                message: "Access denied".to_string(),
            },
            429 => ProviderError::RateLimited { retry_after: 60 },
            code => ProviderError::Api {
                message: error.to_string(),
                status_code: Some(code),
            },
        }
    } else {
        ProviderError::Network { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_debug_masks_key() {
        let config = ProviderConfig {
            name: "paiyun".to_string(),
            api_key: "sk_CZaTEK-dkQPo81US72".to_string(),
            base_url: None,
            default_model: "qwen/qwen3-8b-fp8".to_string(),
            timeout_ms: 30_000,
        };

        let debug = format!("{:?}", config);
        assert!(debug.contains("sk_C***"));
        assert!(!debug.contains("dkQPo81US72"));
    }

    #[test]
    fn test_message_null_content_deserialization() {
        let json = r#"{"role":"assistant","content":null}"#;
        let parsed: Message = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.role, MessageRole::Assistant);
        assert_eq!(parsed.content, "");
    }

    #[test]
    fn test_completion_response_first_content() {
        let json = r#"{
            "id": "chatcmpl-1",
            "model": "qwen/qwen3-8b-fp8",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "{\"feature_name\": null}"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.first_content(), Some("{\"feature_name\": null}"));
    }

    #[test]
    fn test_completion_response_without_choices() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"model": "qwen/qwen3-8b-fp8"}"#).unwrap();
        assert!(parsed.first_content().is_none());
    }
}
