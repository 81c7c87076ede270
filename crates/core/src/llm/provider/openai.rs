//! OpenAI-compatible Provider Implementation
//!
//! Supports:
//! - OpenAI API (Chat Completions)
//! - Compatible gateways (派欧云 / PPInfra, local LLM servers)

use super::*;
use reqwest::{Client, StatusCode};
use serde::Serialize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible Provider
#[derive(Clone)]
pub struct OpenAiProvider {
    config: ProviderConfig,
    client: Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.config.name)
            .field("default_model", &self.config.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Create a new provider
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::InvalidConfig {
                message: format!("provider {} has no API key", config.name),
            });
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::InvalidConfig {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    /// Get base URL for API calls
    fn get_base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(DEFAULT_BASE_URL)
    }
}

/// Wire body for `POST {base}/chat/completions`
#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Map a non-success status and its body text to a provider error
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
            message: format!("gateway rejected the API key ({})", status),
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after: 60 },
        StatusCode::BAD_REQUEST => {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| "Invalid request".to_string());
            ProviderError::InvalidRequest { message }
        }
        _ => ProviderError::Api {
            message: format!("API returned status {}: {}", status, body),
            status_code: Some(status.as_u16()),
        },
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.get_base_url());
        let body = ChatBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature.unwrap_or(0.7),
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_provider_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        response.json().await.map_err(|e| ProviderError::Api {
            message: format!("Failed to parse response: {}", e),
            status_code: None,
        })
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Create a basic OpenAI-compatible configuration
pub fn create_openai_config(
    name: &str,
    api_key: &str,
    base_url: Option<&str>,
    default_model: &str,
) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        api_key: api_key.to_string(),
        base_url: base_url.map(str::to_string),
        default_model: default_model.to_string(),
        timeout_ms: 30_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_api_key() {
        let config = create_openai_config("paiyun", "  ", None, "qwen/qwen3-8b-fp8");
        let err = OpenAiProvider::new(config).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = create_openai_config(
            "paiyun",
            "sk-test-key",
            Some("https://api.ppinfra.com/v3/openai/"),
            "qwen/qwen3-8b-fp8",
        );
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.get_base_url(), "https://api.ppinfra.com/v3/openai");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            ProviderError::Auth { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited { retry_after: 60 }
        ));
        match status_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "model not found"}}"#,
        ) {
            ProviderError::InvalidRequest { message } => assert_eq!(message, "model not found"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream down"),
            ProviderError::Api { status_code: Some(502), .. }
        ));
    }

    #[test]
    fn test_chat_body_shape() {
        let messages = [Message::system("ctx"), Message::user("问题")];
        let body = ChatBody {
            model: "qwen/qwen3-8b-fp8",
            messages: &messages,
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "问题");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_default_base_url() {
        let config = create_openai_config("openai", "sk-test-key", None, "gpt-4o-mini");
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.get_base_url(), DEFAULT_BASE_URL);
        assert_eq!(provider.name(), "openai");
    }
}
