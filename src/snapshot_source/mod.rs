// Snapshot sources: where a cycle's active jobs and raw per-job metrics come from.
// The aggregator only ever sees a SnapshotBatch, so tests can feed synthetic data.

pub mod builder;
mod command;

use std::path::PathBuf;

use crate::error::{Result, SamplerError};
use crate::models::{SnapshotBatch, SourceReport};

pub use builder::build_batch;
pub use command::CommandSource;

pub trait SnapshotSource {
    /// Gathers the active jobs and one raw snapshot per job for this cycle.
    fn collect(&self) -> impl Future<Output = Result<SnapshotBatch>> + Send;
}

/// Fixed batch, handed out unchanged on every call.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    batch: SnapshotBatch,
}

impl StaticSource {
    pub fn new(batch: SnapshotBatch) -> Self {
        Self { batch }
    }
}

impl SnapshotSource for StaticSource {
    async fn collect(&self) -> Result<SnapshotBatch> {
        Ok(self.batch.clone())
    }
}

/// Reads a [`SourceReport`] JSON document from a file written by some other collector.
#[derive(Debug, Clone)]
pub struct ReportFileSource {
    path: PathBuf,
}

impl ReportFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSource for ReportFileSource {
    async fn collect(&self) -> Result<SnapshotBatch> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            SamplerError::SourceUnavailable(format!("read {}: {}", self.path.display(), e))
        })?;
        parse_report(&bytes)
    }
}

/// Parses a report document and folds it into a batch.
pub fn parse_report(bytes: &[u8]) -> Result<SnapshotBatch> {
    let report: SourceReport = serde_json::from_slice(bytes)
        .map_err(|e| SamplerError::InvalidSnapshot(format!("source report: {}", e)))?;
    build_batch(&report)
}
