// On-disk JSON codec. The top level must be an object; entries are validated one by one so a
// single bad job does not cost the others their history.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SamplerError};
use crate::models::{AccumulatedStats, JobId, PersistedState};

/// Decoded file: the usable state plus entries that were rejected (job id, reason).
#[derive(Debug, Default)]
pub struct Decoded {
    pub state: PersistedState,
    pub rejected: Vec<(JobId, String)>,
}

pub fn encode(state: &PersistedState) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(state)
}

pub fn decode(bytes: &[u8], path: &Path) -> Result<Decoded> {
    let entries: BTreeMap<JobId, serde_json::Value> =
        serde_json::from_slice(bytes).map_err(|e| SamplerError::CorruptState {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut out = Decoded::default();
    for (job_id, value) in entries {
        match decode_entry(value) {
            Ok(stats) => {
                out.state.insert(job_id, stats);
            }
            Err(reason) => out.rejected.push((job_id, reason)),
        }
    }
    Ok(out)
}

fn decode_entry(value: serde_json::Value) -> std::result::Result<AccumulatedStats, String> {
    let stats: AccumulatedStats = serde_json::from_value(value).map_err(|e| e.to_string())?;
    stats.check()?;
    Ok(stats)
}
