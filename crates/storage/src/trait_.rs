//! Knowledge store trait definition
//!
//! Read-only query interface over features, process templates and tools

use async_trait::async_trait;
use imds_core::{FeatureSummary, ProcessStage, ProcessTemplate, Tool};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Store errors. An empty result is never an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("knowledge store unreachable: {0}")]
    Connectivity(String),

    #[error("knowledge store query failed: {0}")]
    Query(String),

    #[error("failed to load snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },
}

/// Knowledge store query contract
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Templates for `feature_name` whose `surface_type` or
    /// `feature_surface` equals `surface_type` and whose stage equals
    /// `stage`, ascending by `template_id`
    async fn find_templates(
        &self,
        feature_name: &str,
        surface_type: &str,
        stage: ProcessStage,
    ) -> Result<Vec<ProcessTemplate>, StoreError>;

    /// Tools with `diameter <= diameter_limit` and
    /// `extension_length > height`, diameter descending then extension
    /// ascending
    async fn find_tools(&self, diameter_limit: f64, height: f64) -> Result<Vec<Tool>, StoreError>;

    /// Features whose name or id contains `text`, ascending by id, each
    /// with the distinct process and surface types of its templates
    async fn search_features(&self, text: &str) -> Result<Vec<FeatureSummary>, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Shared store reference
pub type SharedKnowledgeStore = Arc<dyn KnowledgeStore>;

/// Store whose every call fails with [`StoreError::Connectivity`]
#[derive(Debug, Clone)]
pub struct UnreachableStore {
    reason: String,
}

impl UnreachableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::Connectivity(self.reason.clone())
    }
}

#[async_trait]
impl KnowledgeStore for UnreachableStore {
    async fn find_templates(
        &self,
        _feature_name: &str,
        _surface_type: &str,
        _stage: ProcessStage,
    ) -> Result<Vec<ProcessTemplate>, StoreError> {
        Err(self.error())
    }

    async fn find_tools(&self, _diameter_limit: f64, _height: f64) -> Result<Vec<Tool>, StoreError> {
        Err(self.error())
    }

    async fn search_features(&self, _text: &str) -> Result<Vec<FeatureSummary>, StoreError> {
        Err(self.error())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.error())
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}
