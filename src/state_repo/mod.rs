// Persisted job stats: one JSON file, replaced atomically via temp file + rename.
// Concurrent writers are not locked out; the last rename wins and no reader sees a partial file.

pub mod codec;

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SamplerError};
use crate::models::PersistedState;

/// Permission bits on the committed file: world-readable, owner-writable.
pub const STATE_FILE_MODE: u32 = 0o644;

const TEMP_SUFFIX: &str = ".tmp";
const DEFAULT_STALE_TEMP_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct StateRepo {
    path: PathBuf,
    stale_temp_max_age: Duration,
}

impl StateRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_temp_max_age: DEFAULT_STALE_TEMP_MAX_AGE,
        }
    }

    /// Leftover temp files older than this are removed after a successful save.
    pub fn with_stale_temp_max_age(mut self, max_age: Duration) -> Self {
        self.stale_temp_max_age = max_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the previous state. A missing file is an empty state, not an error.
    ///
    /// Entries that fail validation are logged and left out. A file that is not a JSON
    /// object at all yields [`SamplerError::CorruptState`]; the caller decides whether to
    /// carry on with an empty state.
    #[instrument(skip(self), fields(repo = "state", operation = "load", path = %self.path.display()))]
    pub fn load(&self) -> Result<PersistedState> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no state file yet");
                return Ok(PersistedState::new());
            }
            Err(e) => return Err(SamplerError::persistence("read state file", &self.path)(e)),
        };

        let decoded = codec::decode(&bytes, &self.path)?;
        for (job_id, reason) in &decoded.rejected {
            warn!(job_id = %job_id, reason = %reason, "dropping invalid state entry");
        }
        Ok(decoded.state)
    }

    /// Writes `state` to a temp file next to the target, ready to be committed.
    /// Dropping the returned [`StagedWrite`] without committing removes the temp file.
    pub fn stage(&self, state: &PersistedState) -> Result<StagedWrite> {
        let dir = self.dir();
        let mut file = tempfile::Builder::new()
            .prefix(&self.temp_prefix())
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&dir)
            .map_err(SamplerError::persistence("create temp file", &dir))?;

        let payload = codec::encode(state)
            .map_err(|e| SamplerError::persistence("serialize state", file.path())(e.into()))?;
        file.write_all(&payload)
            .and_then(|_| file.flush())
            .and_then(|_| file.as_file().sync_all())
            .map_err(SamplerError::persistence("write temp file", file.path()))?;

        set_state_file_mode(file.path())
            .map_err(SamplerError::persistence("set permissions", file.path()))?;

        Ok(StagedWrite {
            file,
            target: self.path.clone(),
        })
    }

    /// Atomically replaces the state file with `state`, then sweeps stale temp files.
    #[instrument(skip(self, state), fields(repo = "state", operation = "save", path = %self.path.display(), jobs = state.len()))]
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        self.stage(state)?.commit()?;
        let removed = self.sweep_stale_temp_files(self.stale_temp_max_age);
        if removed > 0 {
            debug!(removed, "stale temp files removed");
        }
        Ok(())
    }

    /// Removes this store's temp files older than `max_age`. Younger ones may belong to a
    /// concurrent invocation that has not renamed yet. Returns the number removed.
    pub fn sweep_stale_temp_files(&self, max_age: Duration) -> usize {
        let dir = self.dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "cannot list state directory for temp sweep");
                return 0;
            }
        };
        let prefix = self.temp_prefix().to_string_lossy().into_owned();
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&prefix) || !name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|m| now.duration_since(m).ok());
            if !age.is_some_and(|a| a >= max_age) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(error = %e, file = %entry.path().display(), "failed to remove stale temp file"),
            }
        }
        removed
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// `.<file name>.` so temp files are hidden and attributable to this state file.
    fn temp_prefix(&self) -> OsString {
        let mut prefix = OsString::from(".");
        prefix.push(self.path.file_name().unwrap_or_else(|| "state".as_ref()));
        prefix.push(".");
        prefix
    }
}

/// A fully written temp file awaiting its rename onto the state path.
#[derive(Debug)]
pub struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Renames the temp file onto the target. The rename is the only commit point.
    pub fn commit(self) -> Result<()> {
        let Self { file, target } = self;
        match file.persist(&target) {
            Ok(_) => Ok(()),
            Err(e) => {
                let temp_path = e.file.path().to_path_buf();
                if let Err(cleanup) = e.file.close() {
                    warn!(
                        error = %cleanup,
                        file = %temp_path.display(),
                        "leaked temp file after failed rename"
                    );
                }
                Err(SamplerError::Persistence {
                    operation: "rename temp file",
                    path: target,
                    source: e.error,
                })
            }
        }
    }
}

#[cfg(unix)]
fn set_state_file_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(STATE_FILE_MODE))
}

#[cfg(not(unix))]
fn set_state_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
