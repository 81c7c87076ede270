//! Output rendering for CLI results

use clap::ValueEnum;
use imds_core::{Parameters, RequestId};
use imds_decision::{AdvisoryAnswer, ExtractionReport, Recommendation, NONE_PLACEHOLDER};
use serde::Serialize;

use crate::cli::CliError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

/// One-line parameter summary
pub fn format_parameters(params: &Parameters) -> String {
    let text = |value: Option<&str>| value.unwrap_or(NONE_PLACEHOLDER).to_string();
    let dimensions: Vec<String> = params
        .dimensions
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    format!(
        "特征：{}  面类型：{}  工序：{}  尺寸：{}",
        text(params.feature_name.as_deref()),
        text(params.surface_type.as_deref()),
        text(params.process_stage.map(|s| s.label())),
        if dimensions.is_empty() {
            NONE_PLACEHOLDER.to_string()
        } else {
            dimensions.join(" ")
        }
    )
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))
}

pub fn render_answer(answer: &AdvisoryAnswer, format: OutputFormat) -> Result<String, CliError> {
    if format == OutputFormat::Json {
        return to_json(answer);
    }

    let mut lines = vec![
        format!("问题：{}", answer.question),
        format!("参数：{}", format_parameters(&answer.parameters)),
        String::new(),
        answer.answer.clone(),
    ];
    if let Some(recommendation) = &answer.recommendation {
        lines.push(String::new());
        lines.push(recommendation.details());
    }
    if let Some(knowledge) = &answer.knowledge_context {
        lines.push(String::new());
        lines.push(knowledge.clone());
    }
    if let Some(explanation) = &answer.explanation {
        lines.push(String::new());
        lines.push(format!("解释：{}", explanation));
    }
    Ok(lines.join("\n"))
}

pub fn render_extraction(report: &ExtractionReport, format: OutputFormat) -> Result<String, CliError> {
    if format == OutputFormat::Json {
        return to_json(report);
    }

    let mut lines = vec![
        format!("规则提取：{}", format_parameters(&report.rule)),
        format!("大模型提取：{}", format_parameters(&report.llm.parameters)),
    ];
    if let Some(confidence) = report.llm.confidence {
        lines.push(format!("大模型置信度：{:.2}", confidence));
    }
    for rejected in &report.llm.rejected {
        lines.push(format!("忽略的取值：{} = {}", rejected.field, rejected.value));
    }
    if let Some(error) = &report.llm_error {
        lines.push(format!("大模型未参与：{}", error));
    }
    lines.push(format!("合并结果：{}", format_parameters(&report.merged)));
    Ok(lines.join("\n"))
}

#[derive(Serialize)]
struct MatchView<'a> {
    request_id: RequestId,
    parameters: &'a Parameters,
    recommendation: Option<&'a Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

pub fn render_match(
    request_id: RequestId,
    params: &Parameters,
    recommendation: &Recommendation,
    format: OutputFormat,
) -> Result<String, CliError> {
    if format == OutputFormat::Json {
        return to_json(&MatchView {
            request_id,
            parameters: params,
            recommendation: Some(recommendation),
            error: None,
        });
    }

    Ok([
        format!("参数：{}", format_parameters(params)),
        String::new(),
        recommendation.summary.clone(),
        String::new(),
        recommendation.details(),
    ]
    .join("\n"))
}

/// Match that failed before a recommendation could be composed
pub fn render_match_error(
    request_id: RequestId,
    params: &Parameters,
    error: &str,
    format: OutputFormat,
) -> Result<String, CliError> {
    if format == OutputFormat::Json {
        return to_json(&MatchView {
            request_id,
            parameters: params,
            recommendation: None,
            error: Some(error),
        });
    }

    Ok([
        format!("参数：{}", format_parameters(params)),
        String::new(),
        format!("处理问题时发生错误: {}", error),
    ]
    .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imds_core::{DimensionKey, ProcessStage};

    #[test]
    fn test_format_parameters_with_placeholders() {
        let params = Parameters::new()
            .with_stage(ProcessStage::Finish)
            .with_dimension(DimensionKey::Diameter, 12.0)
            .with_dimension(DimensionKey::Height, 6.0);
        assert_eq!(
            format_parameters(&params),
            "特征：无  面类型：无  工序：精加工  尺寸：diameter=12 height=6"
        );
        assert!(format_parameters(&Parameters::new()).ends_with("尺寸：无"));
    }

    #[test]
    fn test_render_match_error_views() {
        let params = Parameters::new().with_feature("圆柱凸台");

        let json = render_match_error(RequestId::new(), &params, "refused", OutputFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"], "refused");
        assert!(value["recommendation"].is_null());
        assert_eq!(value["parameters"]["feature_name"], "圆柱凸台");

        let text = render_match_error(RequestId::new(), &params, "refused", OutputFormat::Pretty)
            .unwrap();
        assert!(text.ends_with("处理问题时发生错误: refused"));
    }
}
