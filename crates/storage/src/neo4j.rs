//! Neo4j knowledge store
//!
//! 图模型：`(:Feature)-[:HAS_PROCESS]->(:Process)`，`(:Tool)` 独立节点。
//! 刀具与模板之间没有存储的关系，匹配在查询时计算。

use async_trait::async_trait;
use imds_core::{FeatureSummary, Neo4jConfig, ProcessStage, ProcessTemplate, Tool};
use neo4rs::{query, Graph, Row};
use tracing::{debug, info};

use crate::trait_::{KnowledgeStore, StoreError};

const TEMPLATE_QUERY: &str = "
    MATCH (f:Feature)-[:HAS_PROCESS]->(p:Process)
    WHERE f.name = $feature_name
      AND (p.surface_type = $surface_type OR p.feature_surface = $surface_type)
      AND p.process_stage = $process_stage
    RETURN p.template_id AS template_id, f.id AS feature_id, f.name AS feature_name,
           p.component_surface AS component_surface, p.feature_surface AS feature_surface,
           p.surface_type AS surface_type, p.sidewall_feature AS sidewall_feature,
           p.allowance AS allowance, p.process_stage AS process_stage,
           p.process_type AS process_type
    ORDER BY p.template_id";

const TOOL_QUERY: &str = "
    MATCH (t:Tool)
    WHERE t.diameter <= $diameter_limit AND t.extension_length > $height
    RETURN t.id AS tool_id, t.name AS tool_name,
           toFloat(t.diameter) AS diameter, toFloat(t.extension_length) AS extension_length,
           coalesce(toFloat(t.r_angle), 0.0) AS r_angle,
           coalesce(toInteger(t.flute_count), 0) AS flute_count
    ORDER BY t.diameter DESC, t.extension_length ASC";

const FEATURE_SEARCH_QUERY: &str = "
    MATCH (f:Feature)
    WHERE f.name CONTAINS $search_text OR f.id CONTAINS $search_text
    OPTIONAL MATCH (f)-[:HAS_PROCESS]->(p:Process)
    RETURN f.id AS feature_id, f.name AS feature_name,
           collect(DISTINCT p.process_type) AS process_types,
           collect(DISTINCT p.surface_type) AS surface_types
    ORDER BY f.id";

/// Neo4j-backed knowledge store
pub struct Neo4jKnowledgeStore {
    graph: Graph,
    uri: String,
}

impl std::fmt::Debug for Neo4jKnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jKnowledgeStore")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

impl Neo4jKnowledgeStore {
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let graph = Graph::new(
            config.uri.as_str(),
            config.username.as_str(),
            config.password.as_str(),
        )
        .await
        .map_err(|e| StoreError::Connectivity(format!("{}: {}", config.uri, e)))?;

        info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            uri: config.uri.clone(),
        })
    }

    async fn fetch(&self, q: neo4rs::Query) -> Result<Vec<Row>, StoreError> {
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
        {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn column<'r, T: serde::Deserialize<'r>>(row: &'r Row, key: &str) -> Result<T, StoreError> {
    row.get::<T>(key)
        .map_err(|e| StoreError::Query(format!("column {}: {}", key, e)))
}

fn template_from_row(row: &Row) -> Result<ProcessTemplate, StoreError> {
    Ok(ProcessTemplate {
        template_id: column(row, "template_id")?,
        feature_id: column::<Option<String>>(row, "feature_id")?.unwrap_or_default(),
        feature_name: column(row, "feature_name")?,
        component_surface: column(row, "component_surface")?,
        feature_surface: column(row, "feature_surface")?,
        surface_type: column(row, "surface_type")?,
        sidewall_feature: column(row, "sidewall_feature")?,
        allowance: column(row, "allowance")?,
        process_stage: column(row, "process_stage")?,
        process_type: column(row, "process_type")?,
    })
}

fn tool_from_row(row: &Row) -> Result<Tool, StoreError> {
    let flute_count: i64 = column(row, "flute_count")?;
    Ok(Tool {
        tool_id: column(row, "tool_id")?,
        name: column::<Option<String>>(row, "tool_name")?.unwrap_or_default(),
        diameter: column(row, "diameter")?,
        extension_length: column(row, "extension_length")?,
        r_angle: column(row, "r_angle")?,
        flute_count: u32::try_from(flute_count).unwrap_or(0),
    })
}

fn feature_from_row(row: &Row) -> Result<FeatureSummary, StoreError> {
    let non_empty = |values: Vec<String>| -> Vec<String> {
        values.into_iter().filter(|v| !v.is_empty()).collect()
    };
    Ok(FeatureSummary {
        id: column::<Option<String>>(row, "feature_id")?.unwrap_or_default(),
        name: column::<Option<String>>(row, "feature_name")?.unwrap_or_default(),
        process_types: non_empty(column(row, "process_types")?),
        surface_types: non_empty(column(row, "surface_types")?),
    })
}

#[async_trait]
impl KnowledgeStore for Neo4jKnowledgeStore {
    async fn find_templates(
        &self,
        feature_name: &str,
        surface_type: &str,
        stage: ProcessStage,
    ) -> Result<Vec<ProcessTemplate>, StoreError> {
        let q = query(TEMPLATE_QUERY)
            .param("feature_name", feature_name)
            .param("surface_type", surface_type)
            .param("process_stage", stage.label());

        let rows = self.fetch(q).await?;
        let templates = rows
            .iter()
            .map(template_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(feature_name, surface_type, %stage, found = templates.len(), "Template lookup");
        Ok(templates)
    }

    async fn find_tools(&self, diameter_limit: f64, height: f64) -> Result<Vec<Tool>, StoreError> {
        let q = query(TOOL_QUERY)
            .param("diameter_limit", diameter_limit)
            .param("height", height);

        let rows = self.fetch(q).await?;
        let tools = rows
            .iter()
            .map(tool_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(diameter_limit, height, found = tools.len(), "Tool lookup");
        Ok(tools)
    }

    async fn search_features(&self, text: &str) -> Result<Vec<FeatureSummary>, StoreError> {
        let q = query(FEATURE_SEARCH_QUERY).param("search_text", text);

        let rows = self.fetch(q).await?;
        let features = rows
            .iter()
            .map(feature_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(text, found = features.len(), "Feature search");
        Ok(features)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| StoreError::Connectivity(format!("{}: {}", self.uri, e)))
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }
}
