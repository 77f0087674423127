// Folds scheduler allocations and per-GPU readings into one RawSnapshot per job.
// Assumes a GPU belongs to at most one job; the reading's job attribution is taken as given.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Result, SamplerError};
use crate::models::{JobId, JobSnapshot, RawSnapshot, SnapshotBatch, SourceReport};

/// Builds the cycle's batch from a source report.
///
/// Multi-node jobs are left out. Utilization is divided by the job's GPU count (or added as-is
/// when the allocation lists no GPUs), power is summed, memory is the max over the job's GPUs.
pub fn build_batch(report: &SourceReport) -> Result<SnapshotBatch> {
    let mut per_job: BTreeMap<&JobId, RawSnapshot> = BTreeMap::new();
    let mut order: Vec<&JobId> = Vec::with_capacity(report.jobs.len());
    let mut seen_jobs = BTreeSet::new();
    let mut skipped_multi_node = 0usize;

    for alloc in &report.jobs {
        if !seen_jobs.insert(&alloc.job_id) {
            return Err(SamplerError::InvalidSnapshot(format!(
                "job {} listed twice in allocations",
                alloc.job_id
            )));
        }
        if alloc.num_nodes > 1 {
            skipped_multi_node += 1;
            continue;
        }
        order.push(&alloc.job_id);
        per_job.insert(
            &alloc.job_id,
            RawSnapshot {
                gpu_util_percent: 0.0,
                gpu_power_watts: 0.0,
                gpu_mem_mb: 0.0,
                num_gpus: alloc.num_gpus,
                num_cpus: alloc.num_cpus,
            },
        );
    }

    let mut unattributed = 0usize;
    for (index, gpu) in report.gpus.iter().enumerate() {
        for (name, v) in [
            ("util_percent", gpu.util_percent),
            ("power_watts", gpu.power_watts),
            ("mem_used_mb", gpu.mem_used_mb),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SamplerError::InvalidSnapshot(format!(
                    "gpu reading {}: {} must be a finite value >= 0, got {}",
                    index, name, v
                )));
            }
        }

        let Some(raw) = gpu.job_id.as_ref().and_then(|id| per_job.get_mut(id)) else {
            unattributed += 1;
            continue;
        };
        raw.gpu_util_percent += if raw.num_gpus > 0 {
            gpu.util_percent / raw.num_gpus as f64
        } else {
            gpu.util_percent
        };
        raw.gpu_power_watts += gpu.power_watts;
        raw.gpu_mem_mb = raw.gpu_mem_mb.max(gpu.mem_used_mb);
    }

    debug!(
        jobs = order.len(),
        skipped_multi_node,
        gpus = report.gpus.len(),
        unattributed_gpus = unattributed,
        "snapshot batch built"
    );

    let snapshots = order
        .into_iter()
        .map(|id| JobSnapshot {
            job_id: id.clone(),
            raw: per_job[id],
        })
        .collect();
    Ok(SnapshotBatch::from_snapshots(snapshots))
}
