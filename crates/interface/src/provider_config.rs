//! Provider Configuration
//!
//! Builds the LLM service and the knowledge store from the loaded configuration.

use imds_core::llm::{
    ChatCompletionService, OpenAiProvider, ProviderConfig, ProviderError, SharedLanguageModel,
};
use imds_core::{LlmConfig, StoreBackend, StoreConfig};
use imds_storage::{MemoryKnowledgeStore, SharedKnowledgeStore, StoreError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cli::CliError;

/// 派欧云 OpenAI-compatible endpoint
pub(crate) const PPINFRA_BASE_URL: &str = "https://api.ppinfra.com/v3/openai";

/// Normalises provider aliases
pub(crate) fn normalized_provider_key(provider: &str) -> &str {
    match provider {
        "ppinfra" | "paiyun" | "派欧云" => "ppinfra",
        other => other,
    }
}

/// Built-in endpoint for a provider, `None` means the OpenAI default
pub(crate) fn default_base_url(provider: &str) -> Option<&'static str> {
    match normalized_provider_key(provider) {
        "ppinfra" => Some(PPINFRA_BASE_URL),
        _ => None,
    }
}

/// API key from config, then `IMDS_<PROVIDER>_API_KEY`
pub(crate) fn get_api_key(llm: &LlmConfig) -> String {
    llm.api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            let provider_key = normalized_provider_key(&llm.provider);
            let env_var = format!("IMDS_{}_API_KEY", provider_key.to_uppercase());
            std::env::var(env_var).ok()
        })
        .unwrap_or_default()
}

/// Create provider configuration from the `llm` section
pub(crate) fn create_provider_config(llm: &LlmConfig) -> ProviderConfig {
    let base_url = llm
        .base_url
        .clone()
        .or_else(|| default_base_url(&llm.provider).map(str::to_string));

    ProviderConfig {
        name: llm.provider.clone(),
        api_key: get_api_key(llm),
        base_url,
        default_model: llm.model.clone(),
        timeout_ms: llm.timeout.saturating_mul(1000),
    }
}

/// Build the language model service for the `llm` section
pub(crate) fn create_language_model(llm: &LlmConfig) -> Result<SharedLanguageModel, ProviderError> {
    let provider = OpenAiProvider::new(create_provider_config(llm))?;
    let service = ChatCompletionService::new(Arc::new(provider), llm.model.clone())
        .with_sampling(llm.temperature, llm.max_tokens);
    Ok(Arc::new(service))
}

/// Open the configured knowledge store. `snapshot` overrides
/// `store.snapshot` for the memory backend.
pub(crate) async fn open_store(
    config: &StoreConfig,
    snapshot: Option<PathBuf>,
) -> Result<SharedKnowledgeStore, CliError> {
    match config.backend {
        StoreBackend::Memory => {
            let path = snapshot.or_else(|| config.snapshot.clone()).ok_or_else(|| {
                CliError::Config(
                    "memory backend needs a snapshot (--snapshot or store.snapshot)".to_string(),
                )
            })?;
            let store = MemoryKnowledgeStore::load(&path).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Neo4j => Ok(open_neo4j(config).await?),
    }
}

#[cfg(feature = "neo4j")]
async fn open_neo4j(config: &StoreConfig) -> Result<SharedKnowledgeStore, StoreError> {
    use imds_storage::{KnowledgeStore, Neo4jKnowledgeStore};

    let store = Neo4jKnowledgeStore::connect(&config.neo4j).await?;
    store.ping().await?;
    info!(uri = %config.neo4j.uri, "Neo4j knowledge store ready");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "neo4j"))]
async fn open_neo4j(config: &StoreConfig) -> Result<SharedKnowledgeStore, StoreError> {
    info!(uri = %config.neo4j.uri, "Neo4j backend requested");
    Err(StoreError::Connectivity(
        "this build has no neo4j support (enable the `neo4j` feature)".to_string(),
    ))
}
