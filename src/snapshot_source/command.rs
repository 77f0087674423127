// Snapshot helper process: runs the configured argv, reads a SourceReport from stdout.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

use super::{SnapshotSource, parse_report};
use crate::error::{Result, SamplerError};
use crate::models::SnapshotBatch;

#[derive(Debug, Clone)]
pub struct CommandSource {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Result<Self> {
        if argv.is_empty() {
            return Err(SamplerError::SourceUnavailable(
                "no snapshot command configured".into(),
            ));
        }
        Ok(Self { argv, timeout })
    }

    #[instrument(skip(self), fields(source = "command", program = %self.argv[0], timeout_secs = self.timeout.as_secs()))]
    async fn run(&self) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            SamplerError::SourceUnavailable(format!("spawn {}: {}", self.argv[0], e))
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                SamplerError::SourceUnavailable(format!("wait for {}: {}", self.argv[0], e))
            })?,
            Err(_) => {
                return Err(SamplerError::SourceUnavailable(format!(
                    "{} timed out after {:?}",
                    self.argv[0],
                    self.timeout
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SamplerError::SourceUnavailable(format!(
                "{} exited with {}: {}",
                self.argv[0],
                output.status,
                stderr.trim()
            )));
        }
        debug!(bytes = output.stdout.len(), "snapshot command finished");
        Ok(output.stdout)
    }
}

impl SnapshotSource for CommandSource {
    async fn collect(&self) -> Result<SnapshotBatch> {
        let stdout = self.run().await?;
        parse_report(&stdout)
    }
}
