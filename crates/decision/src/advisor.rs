//! Machining Advisor - 问题到推荐的完整流程
//!
//! 规则提取 ∥ 大模型提取 → 合并补全 → 匹配 ∥ 特征检索 → 组装。
//! 只有知识库错误会作为失败返回，且以结构化结果的 `error` 字段体现。

use imds_core::extraction::{LlmAnalysis, LlmExtractor, ParameterMerger, PatternExtractor};
use imds_core::{Parameters, RequestId};
use imds_storage::{SharedKnowledgeStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::composer::{Recommendation, RecommendationComposer};
use crate::engine::MachiningMatcher;
use crate::prompts::{feature_context, Explainer};

/// Advisor errors
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rule, model and merged parameter sets for one question
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub rule: Parameters,
    pub llm: LlmAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_error: Option<String>,
    pub merged: Parameters,
}

/// Structured answer for one question
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryAnswer {
    pub request_id: RequestId,
    pub question: String,
    pub answer: String,
    pub parameters: Parameters,
    pub recommendation: Option<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_confidence: Option<f32>,
    /// Related features found in the knowledge store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdvisoryAnswer {
    /// Error answer; nothing is recommended from partial data
    pub fn failed(
        request_id: RequestId,
        question: &str,
        parameters: Parameters,
        llm_confidence: Option<f32>,
        error: &dyn std::fmt::Display,
    ) -> Self {
        Self {
            request_id,
            question: question.to_string(),
            answer: format!("处理问题时发生错误: {}", error),
            parameters,
            recommendation: None,
            llm_confidence,
            knowledge_context: None,
            explanation: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// 加工顾问
#[derive(Debug)]
pub struct MachiningAdvisor {
    pattern: PatternExtractor,
    llm: LlmExtractor,
    merger: ParameterMerger,
    matcher: MachiningMatcher,
    composer: RecommendationComposer,
    explainer: Option<Explainer>,
}

impl MachiningAdvisor {
    /// Advisor with rule extraction only
    pub fn new(store: SharedKnowledgeStore) -> Self {
        Self {
            pattern: PatternExtractor::new(),
            llm: LlmExtractor::disabled(),
            merger: ParameterMerger::new(),
            matcher: MachiningMatcher::new(store),
            composer: RecommendationComposer::new(),
            explainer: None,
        }
    }

    pub fn with_llm_extractor(mut self, llm: LlmExtractor) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Run both extractors concurrently and merge
    pub async fn extract(&self, question: &str) -> ExtractionReport {
        let (rule, llm_result) = tokio::join!(
            async { self.pattern.extract(question) },
            self.llm.extract(question),
        );

        let (llm, llm_error) = match llm_result {
            Ok(analysis) => (analysis, None),
            Err(e) => {
                if self.llm.is_enabled() {
                    warn!(error = %e, "Language model extraction failed, using rule extraction only");
                }
                (LlmAnalysis::default(), Some(e.to_string()))
            }
        };

        let merged = self
            .merger
            .merge(rule.clone(), llm.parameters.clone());
        debug!(?rule, llm = ?llm.parameters, ?merged, "Parameters merged");

        ExtractionReport {
            rule,
            llm,
            llm_error,
            merged,
        }
    }

    /// Match completed parameters and compose the recommendation
    pub async fn recommend(&self, params: &Parameters) -> Result<Recommendation, AdvisorError> {
        let outcome = self.matcher.match_parameters(params).await?;
        Ok(self
            .composer
            .compose(&outcome.parameters, outcome.templates, outcome.tools))
    }

    /// Summaries of stored features matching the extracted feature name.
    /// Lookup failures only drop the context.
    pub async fn knowledge_context(&self, params: &Parameters) -> Option<String> {
        let feature_name = params.feature_name.as_deref()?;
        match self.matcher.store().search_features(feature_name).await {
            Ok(features) => feature_context(&features),
            Err(e) => {
                warn!(error = %e, "Feature search failed, answering without knowledge context");
                None
            }
        }
    }

    /// Full pipeline. Never fails; store errors are reported in the answer.
    pub async fn ask(&self, question: &str) -> AdvisoryAnswer {
        let request_id = RequestId::new();
        let span = info_span!("advisory", request_id = %request_id);
        self.ask_inner(request_id, question).instrument(span).await
    }

    async fn ask_inner(&self, request_id: RequestId, question: &str) -> AdvisoryAnswer {
        info!(question, "Processing question");

        let report = self.extract(question).await;
        let parameters = report.merged;
        let llm_confidence = report.llm.confidence;

        let (result, knowledge_context) = tokio::join!(
            self.recommend(&parameters),
            self.knowledge_context(&parameters),
        );

        match result {
            Ok(recommendation) => {
                info!(summary = %recommendation.summary, "Recommendation ready");
                let explanation = match &self.explainer {
                    Some(explainer) => {
                        explainer
                            .explain(
                                question,
                                &parameters,
                                &recommendation,
                                knowledge_context.as_deref(),
                            )
                            .await
                    }
                    None => None,
                };
                AdvisoryAnswer {
                    request_id,
                    question: question.to_string(),
                    answer: recommendation.summary.clone(),
                    parameters,
                    recommendation: Some(recommendation),
                    llm_confidence,
                    knowledge_context,
                    explanation,
                    error: None,
                }
            }
            Err(e) => {
                error!(error = %e, "Recommendation failed");
                AdvisoryAnswer::failed(request_id, question, parameters, llm_confidence, &e)
            }
        }
    }
}
