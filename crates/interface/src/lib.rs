//! IMDS Interface - 交互层
//!
//! 职责：
//! - CLI 命令行工具
//! - 日志初始化
//! - 根据配置装配 LLM 服务与知识库

pub mod cli;
pub mod output;
mod provider_config;

pub use cli::{run_cli, CliError, CliStatus};
pub use output::OutputFormat;
