// Domain models

mod job;
mod source;

pub use job::{AccumulatedStats, JobId, JobSnapshot, PersistedState, RawSnapshot, SnapshotBatch};
pub use source::{GpuReading, JobAllocation, SourceReport};
