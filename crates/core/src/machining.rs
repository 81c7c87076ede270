//! Knowledge base entities: features, process templates, tools
//!
//! 这些实体由外部 ETL 写入知识库，核心层只读。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Canonical machinable feature (e.g. 圆柱通孔)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
}

/// 工艺模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTemplate {
    pub template_id: String,
    pub feature_id: String,
    pub feature_name: String,
    #[serde(default)]
    pub component_surface: Option<String>,
    #[serde(default)]
    pub feature_surface: Option<String>,
    #[serde(default)]
    pub surface_type: Option<String>,
    #[serde(default)]
    pub sidewall_feature: Option<String>,
    #[serde(default)]
    pub allowance: Option<String>,
    pub process_stage: String,
    pub process_type: String,
}

impl ProcessTemplate {
    /// Whether the template's surface matches `surface` through either alias
    /// (`surface_type` or `feature_surface`).
    pub fn surface_matches(&self, surface: &str) -> bool {
        self.surface_type.as_deref() == Some(surface)
            || self.feature_surface.as_deref() == Some(surface)
    }
}

/// Feature with the distinct process and surface types of its templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub process_types: Vec<String>,
    #[serde(default)]
    pub surface_types: Vec<String>,
}

impl FeatureSummary {
    /// Knowledge-context lines for this feature
    pub fn describe(&self) -> String {
        let mut text = format!("- {} (ID: {})", self.name, self.id);
        if !self.process_types.is_empty() {
            text.push_str(&format!("\n  工艺类型: {}", self.process_types.join(", ")));
        }
        if !self.surface_types.is_empty() {
            text.push_str(&format!("\n  面类型: {}", self.surface_types.join(", ")));
        }
        text
    }
}

/// 刀具
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub tool_id: String,
    #[serde(rename = "tool_name", alias = "name")]
    pub name: String,
    pub diameter: f64,
    pub extension_length: f64,
    #[serde(default)]
    pub r_angle: f64,
    #[serde(default)]
    pub flute_count: u32,
}

impl Tool {
    /// Ranking order: diameter descending, then extension_length ascending
    pub fn ranking_cmp(&self, other: &Tool) -> Ordering {
        other
            .diameter
            .total_cmp(&self.diameter)
            .then_with(|| self.extension_length.total_cmp(&other.extension_length))
    }
}

/// Stable sort into ranking order; the first tool is the best one
pub fn rank_tools(tools: &mut [Tool]) {
    tools.sort_by(Tool::ranking_cmp);
}

/// Ascending by `template_id`
pub fn sort_templates(templates: &mut [ProcessTemplate]) {
    templates.sort_by(|a, b| a.template_id.cmp(&b.template_id));
}

/// 工序阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStage {
    #[default]
    #[serde(rename = "粗加工")]
    Rough,
    #[serde(rename = "半精加工")]
    SemiFinish,
    #[serde(rename = "精加工")]
    Finish,
    #[serde(rename = "清根")]
    RootCleanup,
}

impl ProcessStage {
    pub const ALL: [ProcessStage; 4] = [
        ProcessStage::Rough,
        ProcessStage::SemiFinish,
        ProcessStage::Finish,
        ProcessStage::RootCleanup,
    ];

    /// Label stored in the knowledge base
    pub fn label(self) -> &'static str {
        match self {
            ProcessStage::Rough => "粗加工",
            ProcessStage::SemiFinish => "半精加工",
            ProcessStage::Finish => "精加工",
            ProcessStage::RootCleanup => "清根",
        }
    }
}

impl fmt::Display for ProcessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unrecognized stage label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown process stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for ProcessStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lowered = trimmed.to_ascii_lowercase().replace('_', "-");
        match (trimmed, lowered.as_str()) {
            ("粗加工", _) | (_, "rough" | "roughing") => Ok(ProcessStage::Rough),
            ("半精加工", _) | (_, "semi-finish" | "semifinish" | "semi-finishing") => {
                Ok(ProcessStage::SemiFinish)
            }
            ("精加工", _) | (_, "finish" | "finishing") => Ok(ProcessStage::Finish),
            ("清根", _) | (_, "root-cleanup" | "rootcleanup" | "cleanup") => {
                Ok(ProcessStage::RootCleanup)
            }
            _ => Err(UnknownStage(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(surface_type: Option<&str>, feature_surface: Option<&str>) -> ProcessTemplate {
        ProcessTemplate {
            template_id: "P001".to_string(),
            feature_id: "F01".to_string(),
            feature_name: "圆柱凸台".to_string(),
            component_surface: Some("底面".to_string()),
            feature_surface: feature_surface.map(str::to_string),
            surface_type: surface_type.map(str::to_string),
            sidewall_feature: None,
            allowance: None,
            process_stage: "精加工".to_string(),
            process_type: "底壁铣".to_string(),
        }
    }

    #[test]
    fn test_stage_parse_chinese_and_english() {
        assert_eq!("精加工".parse::<ProcessStage>().unwrap(), ProcessStage::Finish);
        assert_eq!("半精加工".parse::<ProcessStage>().unwrap(), ProcessStage::SemiFinish);
        assert_eq!("semi_finish".parse::<ProcessStage>().unwrap(), ProcessStage::SemiFinish);
        assert_eq!(" Rough ".parse::<ProcessStage>().unwrap(), ProcessStage::Rough);
        assert_eq!("清根".parse::<ProcessStage>().unwrap(), ProcessStage::RootCleanup);
        assert!("精细加工".parse::<ProcessStage>().is_err());
    }

    #[test]
    fn test_stage_serializes_as_label() {
        let json = serde_json::to_string(&ProcessStage::Finish).unwrap();
        assert_eq!(json, "\"精加工\"");
        assert_eq!(ProcessStage::default(), ProcessStage::Rough);
    }

    #[test]
    fn test_surface_alias_match() {
        assert!(template(Some("plane"), Some("平面")).surface_matches("plane"));
        assert!(template(Some("plane"), Some("平面")).surface_matches("平面"));
        assert!(template(None, Some("垂直面")).surface_matches("垂直面"));
        assert!(!template(Some("plane"), None).surface_matches("垂直面"));
    }

    #[test]
    fn test_tool_name_serde_alias() {
        let tool: Tool = serde_json::from_str(
            r#"{"tool_id":"T001","name":"平底刀D10","diameter":10.0,"extension_length":30.0}"#,
        )
        .unwrap();
        assert_eq!(tool.name, "平底刀D10");
        assert_eq!(tool.flute_count, 0);

        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["tool_name"], "平底刀D10");
    }

    #[test]
    fn test_feature_summary_describe() {
        let summary = FeatureSummary {
            id: "F03".to_string(),
            name: "圆柱凸台".to_string(),
            process_types: vec!["型腔铣".to_string(), "底壁铣".to_string()],
            surface_types: vec!["plane".to_string()],
        };
        assert_eq!(
            summary.describe(),
            "- 圆柱凸台 (ID: F03)\n  工艺类型: 型腔铣, 底壁铣\n  面类型: plane"
        );

        let bare = FeatureSummary {
            id: "F09".to_string(),
            name: "燕尾槽".to_string(),
            ..FeatureSummary::default()
        };
        assert_eq!(bare.describe(), "- 燕尾槽 (ID: F09)");
    }

    fn tool(id: &str, diameter: f64, extension_length: f64) -> Tool {
        Tool {
            tool_id: id.to_string(),
            name: format!("D{}", diameter),
            diameter,
            extension_length,
            r_angle: 0.0,
            flute_count: 4,
        }
    }

    #[test]
    fn test_rank_tools_order_and_stability() {
        let mut tools = vec![
            tool("T1", 6.0, 30.0),
            tool("T2", 10.0, 40.0),
            tool("T3", 10.0, 25.0),
            tool("T4", 10.0, 25.0),
            tool("T5", 8.0, 20.0),
        ];
        rank_tools(&mut tools);
        let ids: Vec<_> = tools.iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["T3", "T4", "T2", "T5", "T1"]);
    }

    #[test]
    fn test_sort_templates_by_id() {
        let mut templates = vec![template(None, None), template(None, None)];
        templates[0].template_id = "P010".to_string();
        templates[1].template_id = "P002".to_string();
        sort_templates(&mut templates);
        assert_eq!(templates[0].template_id, "P002");
    }
}
