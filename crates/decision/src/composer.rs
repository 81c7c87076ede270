//! 推荐结果组装
//!
//! 摘要为固定三槽格式，任一列表为空时对应槽位输出 "无"。

use imds_core::{DimensionKey, Parameters, ProcessTemplate, Tool};
use serde::{Deserialize, Serialize};

/// Placeholder for an empty summary slot
pub const NONE_PLACEHOLDER: &str = "无";

/// Final recommendation for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub process_templates: Vec<ProcessTemplate>,
    pub suitable_tools: Vec<Tool>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Recommendation {
    pub fn best_template(&self) -> Option<&ProcessTemplate> {
        self.process_templates.first()
    }

    pub fn best_tool(&self) -> Option<&Tool> {
        self.suitable_tools.first()
    }

    pub fn alternative_tools(&self) -> &[Tool] {
        self.suitable_tools.get(1..).unwrap_or(&[])
    }

    /// Multi-line human-readable summary
    pub fn details(&self) -> String {
        let mut lines = Vec::new();

        match self.process_templates.as_slice() {
            [] => lines.push("未找到匹配的工艺模板".to_string()),
            [template] => lines.push(format!(
                "推荐工艺模板：{} ({})",
                template.template_id, template.process_type
            )),
            templates => {
                let ids: Vec<&str> = templates.iter().map(|t| t.template_id.as_str()).collect();
                lines.push(format!(
                    "找到 {} 个匹配的工艺模板：{}",
                    templates.len(),
                    ids.join(", ")
                ));
            }
        }

        let limit = display_mm(self.diameter_limit);
        let height = display_mm(self.height);
        match self.best_tool() {
            Some(tool) => {
                lines.push(format!("推荐刀具：{} ({})", tool.tool_id, tool.name));
                lines.push(format!("刀具直径：{}mm (限制：≤{}mm)", tool.diameter, limit));
                lines.push(format!(
                    "伸出长：{}mm (要求：>{}mm)",
                    tool.extension_length, height
                ));
                if self.suitable_tools.len() > 1 {
                    lines.push(format!("共有 {} 个刀具符合条件", self.suitable_tools.len()));
                }
            }
            None => lines.push(format!(
                "未找到符合条件的刀具 (需要：直径≤{}mm，伸出长>{}mm)",
                limit, height
            )),
        }

        lines.join("\n")
    }
}

fn display_mm(value: Option<f64>) -> String {
    value.map_or_else(|| NONE_PLACEHOLDER.to_string(), |v| v.to_string())
}

/// Fixed three-slot summary line
pub fn summary_line(templates: &[ProcessTemplate], tools: &[Tool]) -> String {
    let template = templates.first();
    let template_id = template.map_or(NONE_PLACEHOLDER, |t| t.template_id.as_str());
    let process_type = template.map_or(NONE_PLACEHOLDER, |t| t.process_type.as_str());
    let tool_id = tools.first().map_or(NONE_PLACEHOLDER, |t| t.tool_id.as_str());

    format!(
        "推荐模板ID：{}  推荐加工工艺：{}  推荐刀具ID：{}",
        template_id, process_type, tool_id
    )
}

/// 结果组装器
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationComposer;

impl RecommendationComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(
        &self,
        params: &Parameters,
        templates: Vec<ProcessTemplate>,
        tools: Vec<Tool>,
    ) -> Recommendation {
        let summary = summary_line(&templates, &tools);
        Recommendation {
            process_templates: templates,
            suitable_tools: tools,
            summary,
            diameter_limit: params.diameter_limit(),
            height: params.dimensions.get(DimensionKey::Height),
        }
    }
}
