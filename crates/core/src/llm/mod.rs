//! LLM integration module

pub mod provider;
pub mod service;

pub use provider::*;
pub use service::*;
