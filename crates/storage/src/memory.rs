//! In-memory knowledge store
//!
//! Holds features, process templates and tools loaded from a JSON snapshot
//! `{features, process_templates, tools}`. Template lookup joins through the
//! feature relation: feature name → feature ids → templates.

use async_trait::async_trait;
use imds_core::{
    rank_tools, sort_templates, Feature, FeatureSummary, ProcessStage, ProcessTemplate, Tool,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::trait_::{KnowledgeStore, StoreError};

/// Serialized knowledge base
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub process_templates: Vec<ProcessTemplate>,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

/// In-memory knowledge store implementation
#[derive(Debug, Default)]
pub struct MemoryKnowledgeStore {
    features: Vec<Feature>,
    templates: Vec<ProcessTemplate>,
    tools: Vec<Tool>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot. Features referenced by templates but missing
    /// from `features` are derived from the templates' `(feature_id,
    /// feature_name)` pairs.
    pub fn from_snapshot(snapshot: KnowledgeSnapshot) -> Self {
        let mut features = snapshot.features;
        let mut known: HashSet<String> = features.iter().map(|f| f.id.clone()).collect();

        for template in &snapshot.process_templates {
            if known.insert(template.feature_id.clone()) {
                features.push(Feature {
                    id: template.feature_id.clone(),
                    name: template.feature_name.clone(),
                });
            }
        }

        Self {
            features,
            templates: snapshot.process_templates,
            tools: snapshot.tools,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let snapshot: KnowledgeSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load a snapshot file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let snapshot_error = |message: String| StoreError::Snapshot {
            path: path.to_path_buf(),
            message,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| snapshot_error(e.to_string()))?;
        let store = Self::from_json_str(&content).map_err(|e| snapshot_error(e.to_string()))?;

        info!(
            path = %path.display(),
            features = store.features.len(),
            templates = store.templates.len(),
            tools = store.tools.len(),
            "Knowledge snapshot loaded"
        );
        Ok(store)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn templates(&self) -> &[ProcessTemplate] {
        &self.templates
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn feature_ids(&self, feature_name: &str) -> HashSet<&str> {
        self.features
            .iter()
            .filter(|f| f.name == feature_name)
            .map(|f| f.id.as_str())
            .collect()
    }

    fn summarize(&self, feature: &Feature) -> FeatureSummary {
        let mut summary = FeatureSummary {
            id: feature.id.clone(),
            name: feature.name.clone(),
            ..FeatureSummary::default()
        };
        for template in self.templates.iter().filter(|t| t.feature_id == feature.id) {
            push_distinct(&mut summary.process_types, Some(&template.process_type));
            push_distinct(&mut summary.surface_types, template.surface_type.as_ref());
        }
        summary
    }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
}

#[async_trait]
impl KnowledgeStore for MemoryKnowledgeStore {
    async fn find_templates(
        &self,
        feature_name: &str,
        surface_type: &str,
        stage: ProcessStage,
    ) -> Result<Vec<ProcessTemplate>, StoreError> {
        let feature_ids = self.feature_ids(feature_name);
        let mut found: Vec<ProcessTemplate> = self
            .templates
            .iter()
            .filter(|t| feature_ids.contains(t.feature_id.as_str()))
            .filter(|t| t.surface_matches(surface_type) && t.process_stage == stage.label())
            .cloned()
            .collect();
        sort_templates(&mut found);

        debug!(feature_name, surface_type, %stage, found = found.len(), "Template lookup");
        Ok(found)
    }

    async fn find_tools(&self, diameter_limit: f64, height: f64) -> Result<Vec<Tool>, StoreError> {
        let mut found: Vec<Tool> = self
            .tools
            .iter()
            .filter(|t| t.diameter <= diameter_limit && t.extension_length > height)
            .cloned()
            .collect();
        rank_tools(&mut found);

        debug!(diameter_limit, height, found = found.len(), "Tool lookup");
        Ok(found)
    }

    async fn search_features(&self, text: &str) -> Result<Vec<FeatureSummary>, StoreError> {
        let mut found: Vec<FeatureSummary> = self
            .features
            .iter()
            .filter(|f| f.name.contains(text) || f.id.contains(text))
            .map(|f| self.summarize(f))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(text, found = found.len(), "Feature search");
        Ok(found)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "features": [{"id": "F01", "name": "圆柱凸台"}],
        "process_templates": [
            {"template_id": "P003", "feature_id": "F01", "feature_name": "圆柱凸台",
             "surface_type": "plane", "process_stage": "精加工", "process_type": "侧壁精铣"},
            {"template_id": "P001", "feature_id": "F01", "feature_name": "圆柱凸台",
             "feature_surface": "plane", "process_stage": "精加工", "process_type": "底壁精铣"},
            {"template_id": "P002", "feature_id": "F01", "feature_name": "圆柱凸台",
             "surface_type": "plane", "process_stage": "粗加工", "process_type": "型腔铣"},
            {"template_id": "P010", "feature_id": "F02", "feature_name": "圆柱通孔",
             "surface_type": "plane", "process_stage": "粗加工", "process_type": "钻孔"}
        ],
        "tools": [
            {"tool_id": "T01", "tool_name": "D12", "diameter": 12.0, "extension_length": 6.0},
            {"tool_id": "T02", "tool_name": "D12L", "diameter": 12.0, "extension_length": 30.0},
            {"tool_id": "T03", "tool_name": "D10", "diameter": 10.0, "extension_length": 25.0},
            {"tool_id": "T04", "tool_name": "D16", "diameter": 16.0, "extension_length": 40.0},
            {"tool_id": "T05", "tool_name": "D12S", "diameter": 12.0, "extension_length": 20.0}
        ]
    }"#;

    fn store() -> MemoryKnowledgeStore {
        MemoryKnowledgeStore::from_json_str(SNAPSHOT).unwrap()
    }

    #[test]
    fn test_missing_features_are_derived() {
        let store = store();
        let names: Vec<_> = store.features().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["圆柱凸台", "圆柱通孔"]);
    }

    #[tokio::test]
    async fn test_find_templates_alias_and_order() {
        let found = store()
            .find_templates("圆柱凸台", "plane", ProcessStage::Finish)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|t| t.template_id.as_str()).collect();
        assert_eq!(ids, vec!["P001", "P003"]);
    }

    #[tokio::test]
    async fn test_find_templates_no_stage_match_is_empty() {
        let found = store()
            .find_templates("圆柱通孔", "plane", ProcessStage::Finish)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_find_tools_bounds_and_ranking() {
        let found = store().find_tools(12.0, 6.0).await.unwrap();
        let ids: Vec<_> = found.iter().map(|t| t.tool_id.as_str()).collect();
        // T01 reaches exactly 6.0 and is excluded; T04 is too wide
        assert_eq!(ids, vec!["T05", "T02", "T03"]);
    }

    #[tokio::test]
    async fn test_search_features_collects_distinct_types() {
        let found = store().search_features("凸台").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "F01");
        assert_eq!(found[0].process_types, vec!["侧壁精铣", "底壁精铣", "型腔铣"]);
        // P001 only carries feature_surface, so plane appears once
        assert_eq!(found[0].surface_types, vec!["plane"]);

        let by_id = store().search_features("F02").await.unwrap();
        assert_eq!(by_id[0].name, "圆柱通孔");

        assert!(store().search_features("燕尾槽").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_snapshot_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let store = MemoryKnowledgeStore::load(file.path()).await.unwrap();
        assert_eq!(store.templates().len(), 4);
        assert_eq!(store.tools().len(), 5);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_load_invalid_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let err = MemoryKnowledgeStore::load(file.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::Snapshot { .. }));

        let err = MemoryKnowledgeStore::load("/nonexistent/imds.json").await.unwrap_err();
        assert!(matches!(err, StoreError::Snapshot { .. }));
    }
}
