//! 参数合并：规则优先，大模型只补缺

use super::defaults::ParameterDefaulter;
use crate::parameters::{DimensionKey, Parameters};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterMerger {
    defaulter: ParameterDefaulter,
}

impl ParameterMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precedence only: a rule-extracted value always wins, the LLM value
    /// fills a field or dimension key only when the rule result lacks it.
    pub fn combine(&self, rule: Parameters, llm: Parameters) -> Parameters {
        let mut merged = rule;
        if merged.feature_name.is_none() {
            merged.feature_name = llm.feature_name;
        }
        if merged.surface_type.is_none() {
            merged.surface_type = llm.surface_type;
        }
        if merged.process_stage.is_none() {
            merged.process_stage = llm.process_stage;
        }
        for key in DimensionKey::ALL {
            if merged.dimensions.contains(key) {
                continue;
            }
            if let Some(value) = llm.dimensions.get(key) {
                merged.dimensions.set(key, value);
            }
        }
        merged
    }

    /// [`combine`](Self::combine) followed by default completion
    pub fn merge(&self, rule: Parameters, llm: Parameters) -> Parameters {
        self.defaulter.complete(self.combine(rule, llm))
    }
}
