// Merge logic tests: running mean, max, job appearance/disappearance, batch validation

mod common;

use common::*;
use gpustats::aggregation::{merge, validate};
use gpustats::error::SamplerError;
use gpustats::models::*;

#[test]
fn merge_new_job_starts_at_one_sample_with_raw_values() {
    let b = batch(vec![job("jobA", raw(42.5, 130.0, 900.0, 2, 8))]);
    let out = merge(&b, &PersistedState::new()).unwrap();
    let s = out.get(&JobId::from("jobA")).unwrap();
    assert_eq!(s.sample_count, 1);
    assert_eq!(s.avg_gpu_util_percent, 42.5);
    assert_eq!(s.avg_gpu_power_watts, 130.0);
    assert_eq!(s.max_gpu_mem_mb, 900.0);
    assert_eq!(s.num_gpus, 2);
    assert_eq!(s.num_cpus, 8);
}

#[test]
fn merge_continuing_job_end_to_end_scenario() {
    let previous = state(vec![("jobA", stats(50.0, 100.0, 1000.0, 1, 4, 2))]);
    let b = batch(vec![job("jobA", raw(80.0, 150.0, 1200.0, 1, 4))]);
    let out = merge(&b, &previous).unwrap();
    let s = out.get(&JobId::from("jobA")).unwrap();
    assert!(approx_eq(s.avg_gpu_util_percent, 60.0));
    assert!(approx_eq(s.avg_gpu_power_watts, 350.0 / 3.0));
    assert_eq!(s.max_gpu_mem_mb, 1200.0);
    assert_eq!(s.sample_count, 3);
    assert_eq!(s.num_gpus, 1);
    assert_eq!(s.num_cpus, 4);
}

#[test]
fn merge_running_mean_matches_arithmetic_mean() {
    let values = [12.0, 97.5, 0.0, 33.3, 100.0, 64.25, 5.5, 71.0, 18.75, 50.0];
    let mut st = PersistedState::new();
    for v in values {
        let b = batch(vec![job("42", raw(v, v * 2.0, 10.0, 1, 1))]);
        st = merge(&b, &st).unwrap();
    }
    let s = st.get(&JobId::from("42")).unwrap();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert_eq!(s.sample_count, values.len() as u64);
    assert!(approx_eq(s.avg_gpu_util_percent, mean));
    assert!(approx_eq(s.avg_gpu_power_watts, mean * 2.0));
}

#[test]
fn merge_max_memory_never_decreases() {
    let mems = [500.0, 2000.0, 1500.0, 0.0, 2500.0, 100.0];
    let mut st = PersistedState::new();
    let mut before = 0.0;
    for m in mems {
        st = merge(&batch(vec![job("1", raw(0.0, 0.0, m, 1, 1))]), &st).unwrap();
        let after = st.get(&JobId::from("1")).unwrap().max_gpu_mem_mb;
        assert!(after >= before);
        assert!(after >= m);
        before = after;
    }
    assert_eq!(before, 2500.0);
}

#[test]
fn merge_allocation_counts_take_latest_cycle() {
    let previous = state(vec![("1", stats(10.0, 10.0, 10.0, 4, 32, 5))]);
    let out = merge(&batch(vec![job("1", raw(10.0, 10.0, 10.0, 2, 16))]), &previous).unwrap();
    let s = out.get(&JobId::from("1")).unwrap();
    assert_eq!(s.num_gpus, 2);
    assert_eq!(s.num_cpus, 16);
}

#[test]
fn merge_drops_jobs_no_longer_active() {
    let previous = state(vec![
        ("gone", stats(10.0, 10.0, 10.0, 1, 1, 7)),
        ("stays", stats(20.0, 20.0, 20.0, 1, 1, 1)),
    ]);
    let out = merge(&batch(vec![job("stays", raw(40.0, 40.0, 40.0, 1, 1))]), &previous).unwrap();
    assert!(!out.contains(&JobId::from("gone")));
    assert_eq!(out.len(), 1);
    assert_eq!(out.get(&JobId::from("stays")).unwrap().sample_count, 2);
}

#[test]
fn merge_empty_batch_yields_empty_state() {
    let previous = state(vec![("jobA", stats(50.0, 100.0, 1000.0, 1, 4, 2))]);
    let out = merge(&SnapshotBatch::default(), &previous).unwrap();
    assert!(out.is_empty());
}

#[test]
fn merge_reappearing_job_starts_over() {
    let mut st = merge(&batch(vec![job("1", raw(90.0, 0.0, 0.0, 1, 1))]), &PersistedState::new()).unwrap();
    st = merge(&SnapshotBatch::default(), &st).unwrap();
    st = merge(&batch(vec![job("1", raw(10.0, 0.0, 0.0, 1, 1))]), &st).unwrap();
    let s = st.get(&JobId::from("1")).unwrap();
    assert_eq!(s.sample_count, 1);
    assert_eq!(s.avg_gpu_util_percent, 10.0);
}

#[test]
fn merge_zero_gpu_job_with_util_does_not_fail() {
    let out = merge(&batch(vec![job("cpu", raw(15.0, 0.0, 0.0, 0, 4))]), &PersistedState::new()).unwrap();
    assert_eq!(out.get(&JobId::from("cpu")).unwrap().avg_gpu_util_percent, 15.0);
}

#[test]
fn merge_rejects_duplicate_job_ids() {
    let b = SnapshotBatch {
        active_jobs: vec![JobId::from("1")],
        snapshots: vec![job("1", raw(1.0, 1.0, 1.0, 1, 1)), job("1", raw(2.0, 2.0, 2.0, 1, 1))],
    };
    let err = merge(&b, &PersistedState::new()).unwrap_err();
    assert!(matches!(err, SamplerError::InvalidSnapshot(_)));
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn validate_rejects_active_job_without_snapshot() {
    let b = SnapshotBatch {
        active_jobs: vec![JobId::from("1"), JobId::from("2")],
        snapshots: vec![job("1", raw(1.0, 1.0, 1.0, 1, 1))],
    };
    let err = validate(&b).unwrap_err();
    assert!(err.to_string().contains("no snapshot"));
}

#[test]
fn validate_rejects_snapshot_for_inactive_job() {
    let b = SnapshotBatch {
        active_jobs: vec![],
        snapshots: vec![job("1", raw(1.0, 1.0, 1.0, 1, 1))],
    };
    let err = validate(&b).unwrap_err();
    assert!(err.to_string().contains("not active"));
}

#[test]
fn validate_rejects_negative_or_nan_values() {
    for r in [
        raw(-1.0, 1.0, 1.0, 1, 1),
        raw(1.0, f64::NAN, 1.0, 1, 1),
        raw(1.0, 1.0, f64::INFINITY, 1, 1),
    ] {
        let err = validate(&batch(vec![job("1", r)])).unwrap_err();
        assert!(matches!(err, SamplerError::InvalidSnapshot(_)));
    }
}

#[test]
fn merge_does_not_modify_previous() {
    let previous = state(vec![("1", stats(50.0, 50.0, 50.0, 1, 1, 1))]);
    let snapshot = previous.clone();
    let _ = merge(&batch(vec![job("1", raw(100.0, 100.0, 100.0, 1, 1))]), &previous).unwrap();
    assert_eq!(previous, snapshot);
}
