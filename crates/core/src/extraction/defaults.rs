//! 参数补全：缺省值与派生值
//!
//! 规则按固定顺序执行，后面的高度规则依赖第一条规则的结果。
//! 每条规则都只在目标字段缺失时生效，因此重复执行不会改变结果。

use tracing::debug;

use crate::machining::ProcessStage;
use crate::parameters::{DimensionKey, Parameters};

pub const DEFAULT_STAGE: ProcessStage = ProcessStage::Rough;
pub const DEFAULT_SURFACE: &str = "plane";
pub const FALLBACK_HEIGHT: f64 = 10.0;
/// height = diameter * factor when neither height nor depth is known
pub const DIAMETER_HEIGHT_FACTOR: f64 = 2.0;

/// Fills missing fields with policy defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterDefaulter;

impl ParameterDefaulter {
    pub fn new() -> Self {
        Self
    }

    pub fn complete(&self, mut params: Parameters) -> Parameters {
        self.complete_in_place(&mut params);
        params
    }

    pub fn complete_in_place(&self, params: &mut Parameters) {
        let dims = &mut params.dimensions;
        let diameter = dims.get(DimensionKey::Diameter);

        // 1. 直径 → 长/宽
        if let Some(diameter) = diameter {
            for key in [DimensionKey::Length, DimensionKey::Width] {
                if !dims.contains(key) {
                    dims.set(key, diameter);
                }
            }
        }

        // 2. 工序阶段
        if params.process_stage.is_none() {
            params.process_stage = Some(DEFAULT_STAGE);
        }

        // 3. 面类型
        if params.surface_type.is_none() {
            params.surface_type = Some(DEFAULT_SURFACE.to_string());
        }

        // 4./5. 高度
        let dims = &mut params.dimensions;
        match (dims.get(DimensionKey::Height), dims.get(DimensionKey::Depth)) {
            (None, None) => {
                // an overflowing product falls back like a missing diameter
                let height = diameter
                    .map(|d| d * DIAMETER_HEIGHT_FACTOR)
                    .filter(|h| h.is_finite())
                    .unwrap_or(FALLBACK_HEIGHT);
                dims.set(DimensionKey::Height, height);
            }
            (None, Some(depth)) => {
                dims.set(DimensionKey::Height, depth);
            }
            _ => {}
        }

        debug!(?params, "Parameters completed");
    }
}
