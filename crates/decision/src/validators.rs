//! 刀具约束校验器
//!
//! - DiameterLimitConstraint: 刀具直径 ≤ min(长度, 宽度)，边界包含
//! - ExtensionClearanceConstraint: 伸出长 > 工件高度，边界不包含

use imds_core::Tool;
use std::sync::Arc;

/// Inputs every tool is checked against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolRequest {
    pub diameter_limit: f64,
    pub height: f64,
}

/// 校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintResult {
    Pass,
    Reject(String),
}

impl ConstraintResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, ConstraintResult::Pass)
    }
}

/// 刀具约束 Trait
pub trait ToolConstraint: Send + Sync + std::fmt::Debug {
    /// 校验刀具
    fn check(&self, tool: &Tool, request: &ToolRequest) -> ConstraintResult;

    /// 约束名称
    fn name(&self) -> &str;

    /// 优先级（数字越小越先执行）
    fn priority(&self) -> u32;
}

/// 直径限制
#[derive(Debug, Default)]
pub struct DiameterLimitConstraint;

impl ToolConstraint for DiameterLimitConstraint {
    fn check(&self, tool: &Tool, request: &ToolRequest) -> ConstraintResult {
        if tool.diameter <= request.diameter_limit {
            ConstraintResult::Pass
        } else {
            ConstraintResult::Reject(format!(
                "diameter {}mm exceeds limit {}mm",
                tool.diameter, request.diameter_limit
            ))
        }
    }

    fn name(&self) -> &str {
        "diameter_limit"
    }

    fn priority(&self) -> u32 {
        10
    }
}

/// 伸出长
#[derive(Debug, Default)]
pub struct ExtensionClearanceConstraint;

impl ToolConstraint for ExtensionClearanceConstraint {
    fn check(&self, tool: &Tool, request: &ToolRequest) -> ConstraintResult {
        if tool.extension_length > request.height {
            ConstraintResult::Pass
        } else {
            ConstraintResult::Reject(format!(
                "extension {}mm does not clear height {}mm",
                tool.extension_length, request.height
            ))
        }
    }

    fn name(&self) -> &str {
        "extension_clearance"
    }

    fn priority(&self) -> u32 {
        20
    }
}

/// Built-in constraints in priority order
pub fn default_constraints() -> Vec<Arc<dyn ToolConstraint>> {
    vec![
        Arc::new(DiameterLimitConstraint),
        Arc::new(ExtensionClearanceConstraint),
    ]
}
