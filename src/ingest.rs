//! Durable recording of `plates_data` events, independent of the
//! best-effort WebSocket fan-out, grounded in
//! `original_source/backend/crud/traffic.py::create_traffic`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::TrafficEvent;
use crate::repo::{RepoError, Repository};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

#[async_trait]
pub trait IngestSink: Send + Sync {
    async fn record(&self, event: TrafficEvent) -> Result<(), IngestError>;
}

pub struct RepoIngestSink {
    repo: Arc<dyn Repository>,
}

impl RepoIngestSink {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl IngestSink for RepoIngestSink {
    async fn record(&self, event: TrafficEvent) -> Result<(), IngestError> {
        self.repo.record_traffic(&event).await?;
        Ok(())
    }
}
