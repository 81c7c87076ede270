//! 大模型辅助提取
//!
//! 发送固定结构的提取提示词，从回复中取第一个括号配平的 `{...}` 片段
//! 解析为与规则提取相同的参数结构。单次调用，由调用方给定超时。

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::normalizer::FeatureNormalizer;
use crate::llm::{ProviderError, SharedLanguageModel};
use crate::machining::ProcessStage;
use crate::parameters::{DimensionKey, Parameters};

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Why the language model pass produced nothing
#[derive(Debug, Error)]
pub enum LlmExtractionError {
    #[error("language model extraction is disabled")]
    Disabled,

    #[error("language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("language model call failed: {0}")]
    Service(#[from] ProviderError),

    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("malformed JSON in response: {0}")]
    Json(#[from] serde_json::Error),
}

/// A concrete value the model returned that could not be used
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedValue {
    pub field: String,
    pub value: String,
}

/// Parsed model answer. Only `parameters` feeds the merge; the rest is
/// informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LlmAnalysis {
    pub parameters: Parameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedValue>,
}

/// Structured-extraction prompt for one question
pub fn build_extraction_prompt(question: &str) -> String {
    format!(
        r#"请分析以下加工问题，提取关键参数。

问题：{question}

只返回一个JSON对象，格式如下：
{{
    "feature_name": "特征名称（如：圆柱通孔、矩形凹槽、圆柱凸台）",
    "surface_type": "表面类型（如：plane、垂直面、圆柱面）",
    "process_stage": "工序阶段（粗加工、半精加工、精加工、清根之一）",
    "dimensions": {{
        "diameter": 直径数值,
        "length": 长度数值,
        "width": 宽度数值,
        "height": 高度数值,
        "depth": 深度数值
    }},
    "analysis_confidence": 0到1之间的置信度,
    "missing_parameters": ["缺失的参数名"]
}}

要求：
1. 无法从问题中得到的参数设为 null
2. 尺寸只写数字，不带单位，单位按毫米
3. 特征名称使用标准术语
4. 平面优先写作 "plane"
"#
    )
}

/// Slice of the first balanced `{...}` in `text`. Braces inside JSON
/// string literals are ignored.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_placeholder(text: &str) -> bool {
    text.is_empty()
        || text.eq_ignore_ascii_case("null")
        || text.eq_ignore_ascii_case("none")
        || text == "无"
}

/// `Ok(None)` for absent/placeholder, `Err(raw)` for unusable values
fn text_field(value: Option<&Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            if is_placeholder(s) {
                Ok(None)
            } else {
                Ok(Some(s.to_string()))
            }
        }
        Some(other) => Err(other.to_string()),
    }
}

fn number_field(value: &Value) -> Result<Option<f64>, String> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if is_placeholder(s) {
                return Ok(None);
            }
            let s = s
                .strip_suffix("mm")
                .or_else(|| s.strip_suffix("毫米"))
                .unwrap_or(s)
                .trim();
            s.parse::<f64>().ok()
        }
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => Ok(Some(n)),
        _ => Err(value.to_string()),
    }
}

/// Parses model replies into [`LlmAnalysis`]
#[derive(Clone)]
pub struct LlmExtractor {
    service: Option<SharedLanguageModel>,
    normalizer: FeatureNormalizer,
    timeout: Duration,
}

impl std::fmt::Debug for LlmExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmExtractor")
            .field("enabled", &self.is_enabled())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LlmExtractor {
    pub fn new(service: SharedLanguageModel) -> Self {
        Self {
            service: Some(service),
            normalizer: FeatureNormalizer::default(),
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    /// Extractor that always reports [`LlmExtractionError::Disabled`]
    pub fn disabled() -> Self {
        Self {
            service: None,
            normalizer: FeatureNormalizer::default(),
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_normalizer(mut self, normalizer: FeatureNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One bounded call to the model
    pub async fn extract(&self, text: &str) -> Result<LlmAnalysis, LlmExtractionError> {
        let service = self.service.as_ref().ok_or(LlmExtractionError::Disabled)?;
        let prompt = build_extraction_prompt(text);

        let response = tokio::time::timeout(self.timeout, service.call(&prompt, ""))
            .await
            .map_err(|_| LlmExtractionError::Timeout(self.timeout))??;

        debug!(chars = response.chars().count(), "Language model replied");
        self.parse_response(&response)
    }

    /// Soft form of [`LlmExtractor::extract`]: failures are logged and
    /// yield an empty analysis.
    pub async fn extract_or_empty(&self, text: &str) -> LlmAnalysis {
        match self.extract(text).await {
            Ok(analysis) => analysis,
            Err(LlmExtractionError::Disabled) => LlmAnalysis::default(),
            Err(e) => {
                warn!(error = %e, "Language model extraction failed, using rule extraction only");
                LlmAnalysis::default()
            }
        }
    }

    pub fn parse_response(&self, response: &str) -> Result<LlmAnalysis, LlmExtractionError> {
        let json = first_json_object(response).ok_or(LlmExtractionError::NoJsonObject)?;
        let value: Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(LlmExtractionError::NoJsonObject)?;

        let mut analysis = LlmAnalysis::default();
        self.read_text_fields(object, &mut analysis);
        read_dimensions(object, &mut analysis);
        read_diagnostics(object, &mut analysis);

        for rejected in &analysis.rejected {
            warn!(field = %rejected.field, value = %rejected.value, "Unusable value from language model");
        }
        debug!(parameters = ?analysis.parameters, "Language model extraction parsed");
        Ok(analysis)
    }

    fn read_text_fields(&self, object: &Map<String, Value>, analysis: &mut LlmAnalysis) {
        let mut reject = |field: &str, value: String| {
            analysis.rejected.push(RejectedValue {
                field: field.to_string(),
                value,
            })
        };

        let feature = text_field(object.get("feature_name"))
            .map(|name| name.map(|name| self.normalizer.normalize(&name)));
        let surface = text_field(object.get("surface_type"));
        let stage = text_field(object.get("process_stage")).and_then(|label| {
            label
                .map(|label| label.parse::<ProcessStage>().map_err(|_| label))
                .transpose()
        });

        let feature = feature.unwrap_or_else(|raw| {
            reject("feature_name", raw);
            None
        });
        let surface = surface.unwrap_or_else(|raw| {
            reject("surface_type", raw);
            None
        });
        let stage = stage.unwrap_or_else(|raw| {
            reject("process_stage", raw);
            None
        });

        analysis.parameters.feature_name = feature;
        analysis.parameters.surface_type = surface;
        analysis.parameters.process_stage = stage;
    }
}

fn read_dimensions(object: &Map<String, Value>, analysis: &mut LlmAnalysis) {
    let dimensions = match object.get("dimensions") {
        None | Some(Value::Null) => return,
        Some(Value::Object(dimensions)) => dimensions,
        Some(other) => {
            analysis.rejected.push(RejectedValue {
                field: "dimensions".to_string(),
                value: other.to_string(),
            });
            return;
        }
    };

    for key in DimensionKey::ALL {
        let Some(raw) = dimensions.get(key.as_str()) else {
            continue;
        };
        match number_field(raw) {
            Ok(Some(value)) => {
                analysis.parameters.dimensions.set(key, value);
            }
            Ok(None) => {}
            Err(value) => analysis.rejected.push(RejectedValue {
                field: format!("dimensions.{}", key),
                value,
            }),
        }
    }
}

fn read_diagnostics(object: &Map<String, Value>, analysis: &mut LlmAnalysis) {
    analysis.confidence = match object.get("analysis_confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| (0.0..=1.0).contains(c))
    .map(|c| c as f32);

    if let Some(Value::Array(items)) = object.get("missing_parameters") {
        analysis.missing_parameters = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLanguageModel;
    use std::sync::Arc;

    fn extractor_replying(reply: &str) -> LlmExtractor {
        LlmExtractor::new(Arc::new(ScriptedLanguageModel::replying(reply)))
    }

    #[test]
    fn test_first_json_object_ignores_braces_in_strings() {
        let text = r#"好的：{"a": "x}y", "b": {"c": 1}} 之后还有 {"d": 2}"#;
        assert_eq!(
            first_json_object(text),
            Some(r#"{"a": "x}y", "b": {"c": 1}}"#)
        );
    }

    #[test]
    fn test_first_json_object_handles_escaped_quote() {
        let text = r#"{"a": "say \"}\" ok"}"#;
        assert_eq!(first_json_object(text), Some(text));
    }

    #[test]
    fn test_first_json_object_unbalanced() {
        assert_eq!(first_json_object(r#"{"a": {"b": 1}"#), None);
        assert_eq!(first_json_object("没有JSON"), None);
    }

    #[tokio::test]
    async fn test_extract_fenced_reply() {
        let reply = r#"分析如下：
```json
{
  "feature_name": "圆台",
  "surface_type": "plane",
  "process_stage": "精加工",
  "dimensions": {"diameter": 12, "length": null, "width": "无", "height": "6mm", "depth": null},
  "analysis_confidence": 0.85,
  "missing_parameters": ["length", "width"]
}
```"#;
        let analysis = extractor_replying(reply).extract("问题").await.unwrap();

        assert_eq!(analysis.parameters.feature_name.as_deref(), Some("圆柱凸台"));
        assert_eq!(analysis.parameters.surface_type.as_deref(), Some("plane"));
        assert_eq!(analysis.parameters.process_stage, Some(ProcessStage::Finish));
        assert_eq!(analysis.parameters.dimensions.get(DimensionKey::Diameter), Some(12.0));
        assert_eq!(analysis.parameters.dimensions.get(DimensionKey::Height), Some(6.0));
        assert!(!analysis.parameters.dimensions.contains(DimensionKey::Width));
        assert_eq!(analysis.confidence, Some(0.85));
        assert_eq!(analysis.missing_parameters, vec!["length", "width"]);
        assert!(analysis.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_unusable_values_are_rejected_not_fatal() {
        let reply = r#"{"feature_name": "", "process_stage": "抛光",
            "dimensions": {"diameter": "约十毫米", "height": -2, "depth": 4.5}}"#;
        let analysis = extractor_replying(reply).extract("问题").await.unwrap();

        assert!(analysis.parameters.feature_name.is_none());
        assert!(analysis.parameters.process_stage.is_none());
        assert_eq!(analysis.parameters.dimensions.get(DimensionKey::Depth), Some(4.5));

        let fields: Vec<_> = analysis.rejected.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["process_stage", "dimensions.diameter", "dimensions.height"]
        );
    }

    #[tokio::test]
    async fn test_reply_without_json() {
        let err = extractor_replying("抱歉，我无法回答").extract("问题").await.unwrap_err();
        assert!(matches!(err, LlmExtractionError::NoJsonObject));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let err = extractor_replying(r#"{"feature_name": 圆柱凸台}"#)
            .extract("问题")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmExtractionError::Json(_)));
    }

    #[tokio::test]
    async fn test_service_failure_is_soft() {
        let extractor = LlmExtractor::new(Arc::new(ScriptedLanguageModel::failing("502")));
        assert!(matches!(
            extractor.extract("问题").await,
            Err(LlmExtractionError::Service(_))
        ));
        assert_eq!(extractor.extract_or_empty("问题").await, LlmAnalysis::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let slow = ScriptedLanguageModel::replying(r#"{"feature_name": "圆柱凸台"}"#)
            .with_delay(Duration::from_secs(60));
        let extractor = LlmExtractor::new(Arc::new(slow)).with_timeout(Duration::from_secs(30));

        let err = extractor.extract("问题").await.unwrap_err();
        assert!(matches!(err, LlmExtractionError::Timeout(d) if d == Duration::from_secs(30)));
        assert!(extractor.extract_or_empty("问题").await.parameters.is_empty());
    }

    #[tokio::test]
    async fn test_disabled() {
        let extractor = LlmExtractor::disabled();
        assert!(!extractor.is_enabled());
        assert!(matches!(
            extractor.extract("问题").await,
            Err(LlmExtractionError::Disabled)
        ));
    }

    #[test]
    fn test_prompt_names_every_key() {
        let prompt = build_extraction_prompt("圆柱凸台精加工");
        for key in [
            "feature_name",
            "surface_type",
            "process_stage",
            "dimensions",
            "diameter",
            "length",
            "width",
            "height",
            "depth",
            "analysis_confidence",
            "missing_parameters",
        ] {
            assert!(prompt.contains(key), "missing {}", key);
        }
        assert!(prompt.contains("圆柱凸台精加工"));
    }
}
