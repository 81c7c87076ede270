//! 决策规则提示词与大模型解释
//!
//! 解释是可选的软步骤：失败或超时只记录日志，结果里 `explanation` 为空。

use imds_core::llm::SharedLanguageModel;
use imds_core::{FeatureSummary, Parameters};
use std::time::Duration;
use tracing::warn;

use crate::composer::Recommendation;

/// System rules for explaining a recommendation
pub const DECISION_RULES_PROMPT: &str = "你是一个专业的加工工艺顾问。请根据以下决策规则为用户提供加工工艺和刀具推荐：

## 工艺模板决策规则：
1. 根据特征名称（如：矩形通孔、圆柱凸台、矩形凹槽等）进行初步筛选
2. 根据特征面类型（如：平面、垂直面等）进行精确匹配
3. 根据工序阶段（如：粗加工、半精加工、精加工、清根等）确定唯一模板
4. 输出格式：模板ID（如：P001）和工艺类型（如：底壁铣、平面轮廓铣等）

## 刀具选择决策规则：
1. 直径限制：刀具直径 ≤ min(长度, 宽度)
2. 伸出长限制：刀具伸出长 > 工件高度
3. 优选原则：在满足条件的刀具中，优先选择直径较大的刀具，直径相同时选择伸出长较短的刀具
4. 输出格式：刀具ID（如：T001）

## 回答要求：
1. 严格按照上述规则进行决策
2. 如果找到唯一匹配，直接给出推荐
3. 如果有多个选择，说明原因并给出最优推荐
4. 如果没有找到匹配，说明具体原因
5. 使用中文回答，格式简洁明确";

/// At most this many features go into the knowledge context
pub const MAX_CONTEXT_FEATURES: usize = 5;

/// "相关特征信息" block for the first [`MAX_CONTEXT_FEATURES`] features
pub fn feature_context(features: &[FeatureSummary]) -> Option<String> {
    if features.is_empty() {
        return None;
    }
    let lines: Vec<String> = features
        .iter()
        .take(MAX_CONTEXT_FEATURES)
        .map(FeatureSummary::describe)
        .collect();
    Some(format!("相关特征信息：\n{}", lines.join("\n")))
}

/// Context handed to the model alongside the rules
pub fn explanation_context(
    params: &Parameters,
    recommendation: &Recommendation,
    knowledge: Option<&str>,
) -> String {
    let params_json = serde_json::to_string(params).unwrap_or_default();
    let mut context = format!(
        "{}\n\n## 已提取参数：\n{}\n\n## 匹配结果：\n{}\n{}",
        DECISION_RULES_PROMPT,
        params_json,
        recommendation.summary,
        recommendation.details()
    );
    if let Some(knowledge) = knowledge {
        context.push_str("\n\n## 知识库信息：\n");
        context.push_str(knowledge);
    }
    context
}

/// Asks the language model to explain a recommendation
#[derive(Clone)]
pub struct Explainer {
    service: SharedLanguageModel,
    timeout: Duration,
}

impl std::fmt::Debug for Explainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explainer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Explainer {
    pub fn new(service: SharedLanguageModel, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub async fn explain(
        &self,
        question: &str,
        params: &Parameters,
        recommendation: &Recommendation,
        knowledge: Option<&str>,
    ) -> Option<String> {
        let context = explanation_context(params, recommendation, knowledge);
        match tokio::time::timeout(self.timeout, self.service.call(question, &context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Explanation failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Explanation timed out");
                None
            }
        }
    }
}
