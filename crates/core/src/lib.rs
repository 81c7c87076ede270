// IMDS Core - 核心数据模型与参数提取
//!
//! 包含：
//! - Machining: 特征、加工模板、刀具、工序阶段
//! - Parameters: 提取/合并后的请求参数
//! - RequestId: 请求标识（ULID）
//! - Config: YAML 配置
//! - LLM: Provider 与 LanguageModelService
//! - Extraction: 规则提取、归一化、大模型提取、合并与补全

pub mod config;
pub mod extraction;
pub mod llm;
mod machining;
mod parameters;
mod request;

pub use config::*;
pub use machining::*;
pub use parameters::*;
pub use request::*;
