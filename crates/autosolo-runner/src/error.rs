//! Error types for process execution

use thiserror::Error;

/// Failures while launching or supervising a host process
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Failed to collect output of '{program}': {reason}")]
    WaitFailed { program: String, reason: String },

    #[error("'{program}' exited with status {exit_code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("'{program}' timed out after {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },
}

impl RunnerError {
    /// True when the process could not be started at all (binary missing, bad path).
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. })
    }
}
