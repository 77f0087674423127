use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Used when neither `--config` nor `CONFIG_FILE` names a file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gpustats.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub state: StateConfig,
    pub sampling: SamplingConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    /// Temp files left by interrupted runs are removed once older than this.
    pub stale_temp_max_age_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/run/gpustats.json"),
            stale_temp_max_age_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Upper bound of the random start delay, so nodes sharing a schedule do not fire together.
    pub max_initial_delay_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_initial_delay_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Helper argv that prints a source report as JSON on stdout. Empty means none configured.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StateConfig {
    pub fn stale_temp_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_temp_max_age_secs)
    }
}

impl AppConfig {
    /// Loads from `CONFIG_FILE` if set, otherwise from [`DEFAULT_CONFIG_PATH`] when it exists.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Loads from `path`, falling back to `CONFIG_FILE`. An explicitly named file must exist;
    /// a missing default file means built-in defaults.
    pub fn load_from_path(path: Option<&Path>) -> anyhow::Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("CONFIG_FILE").map(PathBuf::from));
        let path = match explicit {
            Some(p) => p,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("read config {}: {}", path.display(), e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.state.path.as_os_str().is_empty(),
            "state.path must be non-empty"
        );
        anyhow::ensure!(
            self.state.path.file_name().is_some(),
            "state.path must name a file, got {}",
            self.state.path.display()
        );
        anyhow::ensure!(
            self.state.stale_temp_max_age_secs > 0,
            "state.stale_temp_max_age_secs must be > 0, got {}",
            self.state.stale_temp_max_age_secs
        );
        anyhow::ensure!(
            self.source.timeout_secs > 0,
            "source.timeout_secs must be > 0, got {}",
            self.source.timeout_secs
        );
        anyhow::ensure!(
            self.source.command.iter().all(|arg| !arg.is_empty()),
            "source.command must not contain empty arguments"
        );
        anyhow::ensure!(
            self.source.command.first().is_none_or(|p| !p.trim().is_empty()),
            "source.command program must be non-blank"
        );
        Ok(())
    }
}
