// Shared test helpers
#![allow(dead_code)]

use gpustats::models::*;

pub fn raw(util: f64, power: f64, mem: f64, gpus: u32, cpus: u32) -> RawSnapshot {
    RawSnapshot {
        gpu_util_percent: util,
        gpu_power_watts: power,
        gpu_mem_mb: mem,
        num_gpus: gpus,
        num_cpus: cpus,
    }
}

pub fn job(id: &str, raw: RawSnapshot) -> JobSnapshot {
    JobSnapshot {
        job_id: JobId::from(id),
        raw,
    }
}

pub fn batch(jobs: Vec<JobSnapshot>) -> SnapshotBatch {
    SnapshotBatch::from_snapshots(jobs)
}

pub fn stats(util: f64, power: f64, mem: f64, gpus: u32, cpus: u32, n: u64) -> AccumulatedStats {
    AccumulatedStats {
        avg_gpu_util_percent: util,
        avg_gpu_power_watts: power,
        max_gpu_mem_mb: mem,
        num_gpus: gpus,
        num_cpus: cpus,
        sample_count: n,
    }
}

pub fn state(entries: Vec<(&str, AccumulatedStats)>) -> PersistedState {
    entries
        .into_iter()
        .map(|(id, s)| (JobId::from(id), s))
        .collect()
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
