// One sampling cycle: collect snapshot -> load previous state -> merge -> save atomically.
// Store I/O is blocking and runs on the blocking pool.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::aggregation;
use crate::error::{Result, SamplerError};
use crate::models::PersistedState;
use crate::snapshot_source::SnapshotSource;
use crate::state_repo::StateRepo;

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub jobs_written: usize,
    pub jobs_new: usize,
    pub jobs_continued: usize,
    pub jobs_dropped: usize,
    /// The previous file was unreadable and was treated as empty.
    pub previous_state_corrupt: bool,
}

/// Runs one cycle. On any error nothing is written and the previous file stays as it was.
#[instrument(skip(source, repo), fields(path = %repo.path().display()))]
pub async fn run_cycle<S: SnapshotSource>(source: &S, repo: &StateRepo) -> Result<CycleReport> {
    let batch = source.collect().await?;

    let loader = repo.clone();
    let (previous, previous_state_corrupt) =
        match blocking("load state", repo.path(), move || loader.load()).await {
            Ok(state) => (state, false),
            Err(SamplerError::CorruptState { path, reason }) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "previous state unreadable; starting from empty state"
                );
                (PersistedState::new(), true)
            }
            Err(e) => return Err(e),
        };

    let next = aggregation::merge(&batch, &previous)?;

    let jobs_continued = next.job_ids().filter(|id| previous.contains(id)).count();
    let report = CycleReport {
        jobs_written: next.len(),
        jobs_new: next.len() - jobs_continued,
        jobs_continued,
        jobs_dropped: previous.job_ids().filter(|id| !next.contains(id)).count(),
        previous_state_corrupt,
    };

    let saver = repo.clone();
    blocking("save state", repo.path(), move || saver.save(&next)).await?;

    info!(
        jobs_written = report.jobs_written,
        jobs_new = report.jobs_new,
        jobs_continued = report.jobs_continued,
        jobs_dropped = report.jobs_dropped,
        "cycle complete"
    );
    Ok(report)
}

async fn blocking<T, F>(operation: &'static str, path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SamplerError::persistence(operation, path)(std::io::Error::other(e)))?
}
