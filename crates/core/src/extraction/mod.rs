//! Parameter extraction pipeline
//!
//! 职责：
//! - 规则提取（有序模式表）与特征名称归一化
//! - 大模型辅助提取
//! - 合并与缺省补全

pub mod defaults;
pub mod llm;
pub mod merge;
pub mod normalizer;
pub mod patterns;

pub use defaults::{ParameterDefaulter, DEFAULT_STAGE, DEFAULT_SURFACE, FALLBACK_HEIGHT};
pub use llm::{
    build_extraction_prompt, first_json_object, LlmAnalysis, LlmExtractionError, LlmExtractor,
    RejectedValue, DEFAULT_LLM_TIMEOUT,
};
pub use merge::ParameterMerger;
pub use normalizer::FeatureNormalizer;
pub use patterns::{PatternExtractor, PatternField, PatternRule, DEFAULT_PATTERN_TABLE};
