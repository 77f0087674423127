// Source-level inputs: what the scheduler and GPU query helpers report before per-job folding.

use serde::{Deserialize, Serialize};

use super::JobId;

/// Scheduler allocation for one job running on this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAllocation {
    pub job_id: JobId,
    pub num_cpus: u32,
    pub num_gpus: u32,
    #[serde(default = "default_num_nodes")]
    pub num_nodes: u32,
}

fn default_num_nodes() -> u32 {
    1
}

/// One physical GPU's reading, attributed to the job whose processes hold it (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub util_percent: f64,
    pub power_watts: f64,
    pub mem_used_mb: f64,
}

/// Document produced by the snapshot helper command (or a report file).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub jobs: Vec<JobAllocation>,
    #[serde(default)]
    pub gpus: Vec<GpuReading>,
}
