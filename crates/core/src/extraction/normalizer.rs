//! 特征名称归一化：同义词 → 知识库规范名称

use std::collections::HashMap;

/// Built-in synonym table `(synonym, canonical)`
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("圆形通孔", "圆柱通孔"),
    ("圆孔", "圆柱通孔"),
    ("圆形孔", "圆柱通孔"),
    ("矩形孔", "矩形通孔"),
    ("方孔", "矩形通孔"),
    ("圆台", "圆柱凸台"),
    ("矩形槽", "矩形凹槽"),
    ("方槽", "矩形凹槽"),
    ("凹槽", "矩形凹槽"),
];

/// Maps free-text feature names onto canonical knowledge-base names.
/// Unknown names pass through trimmed.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    synonyms: HashMap<String, String>,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_SYNONYMS.iter().copied())
    }
}

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let synonyms = pairs
            .into_iter()
            .map(|(synonym, canonical)| (synonym.to_string(), canonical.to_string()))
            .collect();
        Self { synonyms }
    }

    /// Add or replace a synonym
    pub fn with_synonym(mut self, synonym: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(synonym.into(), canonical.into());
        self
    }

    pub fn normalize(&self, raw: &str) -> String {
        let name = raw.trim();
        self.synonyms
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}
