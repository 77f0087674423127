// Running-average merge: fresh per-job snapshot + previous persisted state -> next state.
// Pure logic; loading and saving stay in state_repo.

use std::collections::BTreeSet;

use crate::error::{Result, SamplerError};
use crate::models::{AccumulatedStats, PersistedState, RawSnapshot, SnapshotBatch};

/// Checks the batch contract: one snapshot per job, active set equal to the snapshot keys,
/// and non-negative finite measurements.
pub fn validate(batch: &SnapshotBatch) -> Result<()> {
    let mut seen = BTreeSet::new();
    for s in &batch.snapshots {
        if !seen.insert(&s.job_id) {
            return Err(SamplerError::InvalidSnapshot(format!(
                "duplicate job id {} in snapshot",
                s.job_id
            )));
        }
        check_raw(&s.raw).map_err(|reason| {
            SamplerError::InvalidSnapshot(format!("job {}: {}", s.job_id, reason))
        })?;
    }

    let mut active = BTreeSet::new();
    for job_id in &batch.active_jobs {
        if !active.insert(job_id) {
            return Err(SamplerError::InvalidSnapshot(format!(
                "duplicate job id {} in active job list",
                job_id
            )));
        }
        if !seen.contains(job_id) {
            return Err(SamplerError::InvalidSnapshot(format!(
                "active job {} has no snapshot",
                job_id
            )));
        }
    }
    if let Some(extra) = seen.iter().find(|id| !active.contains(*id)) {
        return Err(SamplerError::InvalidSnapshot(format!(
            "snapshot for job {} which is not active",
            extra
        )));
    }
    Ok(())
}

fn check_raw(raw: &RawSnapshot) -> std::result::Result<(), String> {
    for (name, v) in [
        ("gpuUtilPercent", raw.gpu_util_percent),
        ("gpuPowerWatts", raw.gpu_power_watts),
        ("gpuMemMB", raw.gpu_mem_mb),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(format!("{} must be a finite value >= 0, got {}", name, v));
        }
    }
    Ok(())
}

/// Merges one cycle into the previous state.
///
/// Active jobs already in `previous` get their averages advanced by one sample; new jobs
/// start at `sample_count == 1`. Jobs in `previous` that are no longer active are dropped.
pub fn merge(batch: &SnapshotBatch, previous: &PersistedState) -> Result<PersistedState> {
    validate(batch)?;

    let next = batch
        .snapshots
        .iter()
        .map(|s| {
            let stats = match previous.get(&s.job_id) {
                Some(prev) => prev.advance(&s.raw),
                None => AccumulatedStats::first(&s.raw),
            };
            (s.job_id.clone(), stats)
        })
        .collect();
    Ok(next)
}
