//! Bridge to the external full-packing program.
//!
//! The program is started as a child process with the container dimensions as
//! its last three arguments. Its output is relayed to viewers verbatim and is
//! never interpreted here.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::PackerConfig;
use crate::model::PackerDimensions;

/// Why a packer run did not complete successfully.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("could not start packer '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("packer did not finish within {} s and was stopped", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("packer exited with {status}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("packer is shutting down")]
    Unavailable,
}

/// Captured output of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackerOutput {
    pub stdout: String,
    pub stderr: String,
}

/// `{output, error}` pair delivered to the requesting viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackerReport {
    pub output: String,
    pub error: String,
}

impl PackerReport {
    /// Report for a run that never produced output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: error.into(),
        }
    }
}

impl From<Result<PackerOutput, BridgeError>> for PackerReport {
    fn from(result: Result<PackerOutput, BridgeError>) -> Self {
        match result {
            Ok(PackerOutput { stdout, stderr }) => Self {
                output: stdout,
                error: stderr,
            },
            Err(err) => Self::failure(err.relay_message()),
        }
    }
}

impl BridgeError {
    /// Text shown to viewers: the program's own stderr when it has any.
    pub fn relay_message(&self) -> String {
        match self {
            BridgeError::Failed { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Launches packer runs with bounded concurrency and a per-run timeout.
#[derive(Clone, Debug)]
pub struct ExternalPacker {
    program: String,
    script: Option<PathBuf>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ExternalPacker {
    pub fn new(config: &PackerConfig) -> Self {
        Self {
            program: config.program().to_string(),
            script: config.script().map(PathBuf::from),
            timeout: config.timeout(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs())),
        }
    }

    /// Runs the packer for `dimensions` and waits for it to finish.
    ///
    /// Waits for a free slot first when `max_concurrent_runs` runs are already
    /// active. The child is killed if the timeout elapses or the returned
    /// future is dropped.
    pub async fn run(&self, dimensions: PackerDimensions) -> Result<PackerOutput, BridgeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BridgeError::Unavailable)?;

        let mut command = Command::new(&self.program);
        if let Some(script) = &self.script {
            command.arg(script);
        }
        command
            .args(dimensions.as_args())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::info!(
            program = %self.program,
            script = ?self.script,
            %dimensions,
            "starting packer run"
        );

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(BridgeError::Launch {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => return Err(BridgeError::Timeout(self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(BridgeError::Failed {
                status: output.status,
                stderr,
            });
        }

        if !stderr.is_empty() {
            tracing::warn!(%dimensions, stderr = %stderr.trim_end(), "packer wrote to stderr");
        }
        tracing::info!(%dimensions, bytes = stdout.len(), "packer run finished");

        Ok(PackerOutput { stdout, stderr })
    }

    /// Like [`run`](Self::run), folded into the `{output, error}` pair.
    pub async fn run_report(&self, dimensions: PackerDimensions) -> PackerReport {
        let result = self.run(dimensions).await;
        if let Err(err) = &result {
            tracing::warn!(%dimensions, error = %err, "packer run failed");
        }
        PackerReport::from(result)
    }
}
