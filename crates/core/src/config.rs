//! IMDS 配置系统
//!
//! 支持 YAML 配置文件和环境变量

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "imds.yaml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// IMDS 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImdsConfig {
    /// LLM 配置
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// 知识库配置
    #[serde(default)]
    pub store: StoreConfig,

    /// 推荐流程配置
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ImdsConfig {
    /// Parse a YAML document and apply environment overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: ImdsConfig = if yaml.trim().is_empty() {
            ImdsConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from [`DEFAULT_CONFIG_FILE`] when it
    /// exists. Falls back to defaults when no file is given or found.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Self::from_yaml_str("");
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    fn apply_env_overrides(&mut self) {
        let llm_vars = [
            env_var("IMDS_LLM_API_KEY"),
            env_var("IMDS_LLM_BASE_URL"),
            env_var("IMDS_LLM_MODEL"),
        ];
        if llm_vars.iter().any(Option::is_some) {
            let llm = self.llm.get_or_insert_with(LlmConfig::default);
            let [api_key, base_url, model] = llm_vars;
            if let Some(v) = api_key {
                llm.api_key = Some(v);
            }
            if let Some(v) = base_url {
                llm.base_url = Some(v);
            }
            if let Some(v) = model {
                llm.model = v;
            }
        }

        let neo4j = &mut self.store.neo4j;
        if let Some(v) = env_var("IMDS_NEO4J_URI") {
            neo4j.uri = v;
        }
        if let Some(v) = env_var("IMDS_NEO4J_USERNAME") {
            neo4j.username = v;
        }
        if let Some(v) = env_var("IMDS_NEO4J_PASSWORD") {
            neo4j.password = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.llm_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.llm_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(llm) = &self.llm {
            if llm.enabled && llm.model.trim().is_empty() {
                return Err(ConfigError::Invalid("llm.model must not be empty".to_string()));
            }
        }
        if self.store.backend == StoreBackend::Neo4j && self.store.neo4j.uri.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.neo4j.uri is required for the neo4j backend".to_string(),
            ));
        }
        Ok(())
    }

    /// LLM config when present and enabled
    pub fn active_llm(&self) -> Option<&LlmConfig> {
        self.llm.as_ref().filter(|llm| llm.enabled)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// LLM 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// 是否启用 LLM
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider 名称 (OpenAI 兼容接口: ppinfra / openai / custom)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// 默认模型
    #[serde(default = "default_model")]
    pub model: String,

    /// API 基础 URL
    pub base_url: Option<String>,

    /// API Key
    pub api_key: Option<String>,

    /// 温度参数
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// 最大 token 数
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP 请求超时 (秒)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "ppinfra".to_string()
}

fn default_model() -> String {
    "qwen/qwen3-8b-fp8".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Mask all but a short prefix of a secret
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() > 8 {
        let prefix: String = secret.chars().take(4).collect();
        format!("{}***", prefix)
    } else {
        "***".to_string()
    }
}

/// 知识库后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Neo4j,
}

/// 知识库配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 存储类型
    #[serde(default)]
    pub backend: StoreBackend,

    /// JSON 知识快照 (memory 后端)
    pub snapshot: Option<PathBuf>,

    /// Neo4j 连接参数
    #[serde(default)]
    pub neo4j: Neo4jConfig,
}

/// Neo4j 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,
    #[serde(default = "default_neo4j_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_neo4j_username() -> String {
    "neo4j".to_string()
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: default_neo4j_uri(),
            username: default_neo4j_username(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .finish()
    }
}

/// 推荐流程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// LLM 参数提取超时 (秒)
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,

    /// 是否生成 LLM 解释
    #[serde(default)]
    pub explain: bool,
}

fn default_llm_timeout() -> u64 {
    30
}

impl PipelineConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_timeout_secs: default_llm_timeout(),
            explain: false,
        }
    }
}
