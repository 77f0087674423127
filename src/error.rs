// Error kinds for one sampling cycle. None of them is retried inside the cycle.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// Malformed or inconsistent input from the snapshot source. The cycle aborts without writing.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The previous state file could not be parsed at all.
    #[error("corrupt state file {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// Reading, staging, or committing the state file failed. The previous file stays authoritative.
    #[error("{operation} failed for {}: {source}", path.display())]
    Persistence {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot collaborator could not produce a report (spawn failure, exit status, timeout).
    #[error("snapshot source unavailable: {0}")]
    SourceUnavailable(String),
}

impl SamplerError {
    pub(crate) fn persistence(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SamplerError::Persistence {
            operation,
            path,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SamplerError>;
