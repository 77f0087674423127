// Per-job models: identifier, one cycle's raw snapshot, and the persisted running stats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scheduler job identifier. Opaque; stable for the job's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One cycle's measurements for a job. Utilization is already normalized by GPU count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    pub gpu_util_percent: f64,
    pub gpu_power_watts: f64,
    /// Max memory observed across the job's GPUs this cycle.
    pub gpu_mem_mb: f64,
    pub num_gpus: u32,
    pub num_cpus: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub raw: RawSnapshot,
}

/// Everything the snapshot source hands to the aggregator for one cycle.
///
/// `active_jobs` must match the job IDs in `snapshots` exactly, one snapshot per job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBatch {
    pub active_jobs: Vec<JobId>,
    pub snapshots: Vec<JobSnapshot>,
}

impl SnapshotBatch {
    /// Batch whose active set is exactly the jobs in `snapshots`.
    pub fn from_snapshots(snapshots: Vec<JobSnapshot>) -> Self {
        let active_jobs = snapshots.iter().map(|s| s.job_id.clone()).collect();
        Self {
            active_jobs,
            snapshots,
        }
    }
}

/// Running statistics for one job. Key names are the on-disk format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccumulatedStats {
    #[serde(rename = "gpu_util")]
    pub avg_gpu_util_percent: f64,
    #[serde(rename = "gpu_power")]
    pub avg_gpu_power_watts: f64,
    #[serde(rename = "gpu_mem_max")]
    pub max_gpu_mem_mb: f64,
    #[serde(rename = "ngpu")]
    pub num_gpus: u32,
    #[serde(rename = "ncpu")]
    pub num_cpus: u32,
    #[serde(rename = "step")]
    pub sample_count: u64,
}

impl AccumulatedStats {
    /// Stats for a job seen for the first time.
    pub fn first(raw: &RawSnapshot) -> Self {
        Self {
            avg_gpu_util_percent: raw.gpu_util_percent,
            avg_gpu_power_watts: raw.gpu_power_watts,
            max_gpu_mem_mb: raw.gpu_mem_mb,
            num_gpus: raw.num_gpus,
            num_cpus: raw.num_cpus,
            sample_count: 1,
        }
    }

    /// Folds one more cycle into the running mean/max. Allocation counts take the latest values.
    pub fn advance(&self, raw: &RawSnapshot) -> Self {
        let n = self.sample_count as f64;
        let next = n + 1.0;
        Self {
            avg_gpu_util_percent: (self.avg_gpu_util_percent * n + raw.gpu_util_percent) / next,
            avg_gpu_power_watts: (self.avg_gpu_power_watts * n + raw.gpu_power_watts) / next,
            max_gpu_mem_mb: self.max_gpu_mem_mb.max(raw.gpu_mem_mb),
            num_gpus: raw.num_gpus,
            num_cpus: raw.num_cpus,
            sample_count: self.sample_count + 1,
        }
    }

    /// Structural checks applied to entries read back from disk.
    pub fn check(&self) -> Result<(), String> {
        if self.sample_count == 0 {
            return Err("step must be >= 1".into());
        }
        for (name, v) in [
            ("gpu_util", self.avg_gpu_util_percent),
            ("gpu_power", self.avg_gpu_power_watts),
            ("gpu_mem_max", self.max_gpu_mem_mb),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} must be a finite value >= 0, got {}", name, v));
            }
        }
        Ok(())
    }
}

/// Jobs active in the most recent completed cycle and their running stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedState {
    jobs: BTreeMap<JobId, AccumulatedStats>,
}

impl PersistedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &JobId) -> Option<&AccumulatedStats> {
        self.jobs.get(job_id)
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn insert(&mut self, job_id: JobId, stats: AccumulatedStats) -> Option<AccumulatedStats> {
        self.jobs.insert(job_id, stats)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobId, &AccumulatedStats)> {
        self.jobs.iter()
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &JobId> {
        self.jobs.keys()
    }
}

impl FromIterator<(JobId, AccumulatedStats)> for PersistedState {
    fn from_iter<I: IntoIterator<Item = (JobId, AccumulatedStats)>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}
