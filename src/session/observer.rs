//! Per-item extension hook for adaptive runs.
//!
//! The engine stays storage-agnostic; callers that want live progress
//! reporting or per-item persistence inject an observer. Observer
//! failures are logged and never interrupt the run.

use async_trait::async_trait;
use thiserror::Error;

/// Snapshot emitted after each UPDATING step.
#[derive(Debug, Clone)]
pub struct ItemEvent {
    pub subject_id: String,
    pub item_id: String,
    /// 1-based position within the run.
    pub index: usize,
    pub correctness: f64,
    pub theta: f64,
    pub standard_error: f64,
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn on_item(&self, event: ItemEvent) -> Result<(), ObserverError>;
}
