//! Machining Matcher - 模板与刀具匹配引擎
//!
//! 职责：
//! - 按特征名称、面类型（任一别名）、工序阶段精确匹配工艺模板
//! - 按直径上限与伸出长筛选刀具
//! - 排序与并列裁决：模板按 template_id 升序；刀具直径降序、伸出长升序
//!
//! 设计原则：
//! - 两个查询互不依赖，并发执行；任一失败即整体失败
//! - 空结果是合法结果，不是错误

use imds_core::extraction::{ParameterDefaulter, DEFAULT_STAGE, DEFAULT_SURFACE};
use imds_core::{
    rank_tools, sort_templates, DimensionKey, Parameters, ProcessTemplate, Tool,
};
use imds_storage::{SharedKnowledgeStore, StoreError};
use std::sync::Arc;
use tracing::debug;

use crate::validators::{default_constraints, ConstraintResult, ToolConstraint, ToolRequest};

/// Matcher output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Completed parameters the lookups ran with
    pub parameters: Parameters,
    pub templates: Vec<ProcessTemplate>,
    pub tools: Vec<Tool>,
    /// `min(length, width)` the tools were filtered with
    pub diameter_limit: Option<f64>,
    pub height: Option<f64>,
}

/// 匹配引擎
pub struct MachiningMatcher {
    store: SharedKnowledgeStore,

    /// 约束列表（按优先级排序）
    constraints: Vec<Arc<dyn ToolConstraint>>,

    defaulter: ParameterDefaulter,
}

impl std::fmt::Debug for MachiningMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachiningMatcher")
            .field("store", &self.store.backend())
            .field("constraints", &self.constraints)
            .finish()
    }
}

impl MachiningMatcher {
    pub fn new(store: SharedKnowledgeStore) -> Self {
        Self {
            store,
            constraints: default_constraints(),
            defaulter: ParameterDefaulter::new(),
        }
    }

    /// 注册约束
    pub fn register_constraint(&mut self, constraint: Arc<dyn ToolConstraint>) {
        self.constraints.push(constraint);
        self.constraints.sort_by_key(|c| c.priority());
    }

    pub fn store(&self) -> &SharedKnowledgeStore {
        &self.store
    }

    /// Match `params` against the store. Parameters are completed first.
    pub async fn match_parameters(&self, params: &Parameters) -> Result<MatchOutcome, StoreError> {
        let params = self.defaulter.complete(params.clone());
        let diameter_limit = params.diameter_limit();
        let height = params.dimensions.get(DimensionKey::Height);

        let (templates, tools) = tokio::try_join!(
            self.lookup_templates(&params),
            self.lookup_tools(diameter_limit, height),
        )?;

        debug!(
            templates = templates.len(),
            tools = tools.len(),
            ?diameter_limit,
            ?height,
            "Match finished"
        );

        Ok(MatchOutcome {
            parameters: params,
            templates,
            tools,
            diameter_limit,
            height,
        })
    }

    async fn lookup_templates(&self, params: &Parameters) -> Result<Vec<ProcessTemplate>, StoreError> {
        let Some(feature_name) = params.feature_name.as_deref() else {
            debug!("No feature name, skipping template lookup");
            return Ok(Vec::new());
        };
        let surface = params.surface_type.as_deref().unwrap_or(DEFAULT_SURFACE);
        let stage = params.process_stage.unwrap_or(DEFAULT_STAGE);

        let mut templates = self
            .store
            .find_templates(feature_name, surface, stage)
            .await?;
        sort_templates(&mut templates);
        Ok(templates)
    }

    async fn lookup_tools(
        &self,
        diameter_limit: Option<f64>,
        height: Option<f64>,
    ) -> Result<Vec<Tool>, StoreError> {
        let (Some(diameter_limit), Some(height)) = (diameter_limit, height) else {
            debug!("No diameter limit, skipping tool lookup");
            return Ok(Vec::new());
        };

        let request = ToolRequest {
            diameter_limit,
            height,
        };
        let mut tools = self.store.find_tools(diameter_limit, height).await?;
        tools.retain(|tool| self.accepts(tool, &request));
        rank_tools(&mut tools);
        Ok(tools)
    }

    fn accepts(&self, tool: &Tool, request: &ToolRequest) -> bool {
        self.constraints.iter().all(|constraint| match constraint.check(tool, request) {
            ConstraintResult::Pass => true,
            ConstraintResult::Reject(reason) => {
                debug!(tool = %tool.tool_id, constraint = constraint.name(), %reason, "Tool rejected");
                false
            }
        })
    }
}
