//! 规则提取：有序模式表
//!
//! 每条规则 `{field, pattern, priority}`。单值字段（特征、工序、面类型）
//! 按优先级顺序尝试，第一条命中的规则生效；尺寸规则全部执行，同一尺寸键
//! 以最后一次命中为准。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::normalizer::FeatureNormalizer;
use crate::machining::ProcessStage;
use crate::parameters::{DimensionKey, Parameters};

/// Field a pattern rule extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternField {
    FeatureName,
    SurfaceType,
    ProcessStage,
    Dimension(DimensionKey),
}

/// One row of the pattern table. Lower `priority` is tried first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    pub field: PatternField,
    pub pattern: Cow<'static, str>,
    pub priority: u32,
}

impl PatternRule {
    pub const fn fixed(field: PatternField, pattern: &'static str, priority: u32) -> Self {
        Self {
            field,
            pattern: Cow::Borrowed(pattern),
            priority,
        }
    }

    pub fn new(field: PatternField, pattern: impl Into<String>, priority: u32) -> Self {
        Self {
            field,
            pattern: Cow::Owned(pattern.into()),
            priority,
        }
    }
}

macro_rules! dimension_rule {
    ($key:expr, $label:literal, $priority:expr) => {
        PatternRule::fixed(
            PatternField::Dimension($key),
            concat!($label, r"(?:是|为)?\s*([0-9]+(?:\.[0-9]+)?)\s*(?:mm|MM|毫米)"),
            $priority,
        )
    };
}

/// Built-in pattern table
pub const DEFAULT_PATTERN_TABLE: &[PatternRule] = &[
    // 特征名称
    PatternRule::fixed(
        PatternField::FeatureName,
        r"(圆柱通孔|圆形通孔|矩形通孔|圆柱凸台|矩形凹槽|圆形盲孔)",
        10,
    ),
    PatternRule::fixed(PatternField::FeatureName, r"特征类型[是为](.+?)(?:[，,。]|$)", 20),
    PatternRule::fixed(PatternField::FeatureName, r"特征[是为](.+?)(?:[，,。]|$)", 30),
    PatternRule::fixed(PatternField::FeatureName, r"工件.*特征.*[是为](.+?)(?:[，,。]|$)", 40),
    PatternRule::fixed(PatternField::FeatureName, r"有一个(.+?)(?:[，,。]|$)", 50),
    // 尺寸
    dimension_rule!(DimensionKey::Diameter, "直径", 10),
    dimension_rule!(DimensionKey::Diameter, "孔直径", 11),
    dimension_rule!(DimensionKey::Length, "长度", 20),
    dimension_rule!(DimensionKey::Width, "宽度", 30),
    dimension_rule!(DimensionKey::Height, "高度", 40),
    dimension_rule!(DimensionKey::Depth, "深度", 50),
    // 工序阶段
    PatternRule::fixed(PatternField::ProcessStage, r"(粗加工|半精加工|精加工|清根)", 10),
    PatternRule::fixed(PatternField::ProcessStage, r"需要(粗加工|半精加工|精加工|清根)", 20),
    PatternRule::fixed(PatternField::ProcessStage, r"进行(粗加工|半精加工|精加工|清根)", 30),
    // 面类型
    PatternRule::fixed(PatternField::SurfaceType, r"(平面|垂直面|圆柱面|锥面)", 10),
    PatternRule::fixed(PatternField::SurfaceType, r"表面[是为](平面|垂直面|圆柱面|锥面)", 20),
    PatternRule::fixed(PatternField::SurfaceType, r"面[是为](平面|垂直面|圆柱面|锥面)", 30),
];

#[derive(Debug, Clone)]
struct CompiledRule {
    field: PatternField,
    regex: Regex,
    priority: u32,
}

impl CompiledRule {
    fn compile(rule: &PatternRule) -> Result<Self, regex::Error> {
        Ok(Self {
            field: rule.field,
            regex: Regex::new(&rule.pattern)?,
            priority: rule.priority,
        })
    }

    /// Group 1 when the pattern has one, otherwise the whole match
    fn first_capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.regex.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

fn default_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        sort_rules(
            DEFAULT_PATTERN_TABLE
                .iter()
                .map(|rule| CompiledRule::compile(rule).expect("valid built-in pattern"))
                .collect(),
        )
    })
}

fn sort_rules(mut rules: Vec<CompiledRule>) -> Vec<CompiledRule> {
    rules.sort_by_key(|rule| rule.priority);
    rules
}

/// Rule-based parameter extractor
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    rules: Vec<CompiledRule>,
    normalizer: FeatureNormalizer,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self {
            rules: default_rules().to_vec(),
            normalizer: FeatureNormalizer::default(),
        }
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a custom rule table
    pub fn from_rules<'a>(
        rules: impl IntoIterator<Item = &'a PatternRule>,
    ) -> Result<Self, regex::Error> {
        let compiled = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules: sort_rules(compiled),
            normalizer: FeatureNormalizer::default(),
        })
    }

    pub fn with_normalizer(mut self, normalizer: FeatureNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Extract parameters from free text. Never fails; unmatched fields
    /// stay absent.
    pub fn extract(&self, text: &str) -> Parameters {
        let mut params = Parameters::new();

        params.feature_name = self
            .first_match(PatternField::FeatureName, text, |raw| {
                Some(self.normalizer.normalize(raw))
            });

        self.extract_dimensions(text, &mut params);

        params.process_stage = self.first_match(PatternField::ProcessStage, text, |raw| {
            raw.parse::<ProcessStage>().ok()
        });

        params.surface_type = self
            .first_match(PatternField::SurfaceType, text, |raw| Some(raw.to_string()));

        debug!(?params, "Rule extraction finished");
        params
    }

    fn rules_for(&self, field: PatternField) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |rule| rule.field == field)
    }

    fn first_match<T>(
        &self,
        field: PatternField,
        text: &str,
        convert: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        self.rules_for(field).find_map(|rule| {
            let raw = rule.first_capture(text)?.trim();
            if raw.is_empty() {
                return None;
            }
            convert(raw)
        })
    }

    fn extract_dimensions(&self, text: &str, params: &mut Parameters) {
        let dimension_rules = self.rules.iter().filter_map(|rule| match rule.field {
            PatternField::Dimension(key) => Some((key, rule)),
            _ => None,
        });

        for (key, rule) in dimension_rules {
            for caps in rule.regex.captures_iter(text) {
                let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok())
                else {
                    continue;
                };
                params.dimensions.set(key, value);
            }
        }
    }
}
