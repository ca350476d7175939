use std::time::Duration;

use crate::CommandSpec;
use crate::error::RunnerError;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// None if terminated by signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into [`RunnerError::NonZeroExit`].
    pub fn into_success(self, cmd: &CommandSpec) -> Result<Self, RunnerError> {
        if self.success() {
            Ok(self)
        } else {
            Err(RunnerError::NonZeroExit {
                program: cmd.display(),
                exit_code: self.exit_code,
                stderr: self.stderr_string().trim().to_string(),
            })
        }
    }
}

/// Synchronous process execution with a hard timeout.
///
/// Implementations MUST use argv-style APIs only. The device adapters are
/// written against this trait so tests can substitute a scripted runner.
pub trait ProcessRunner: Send + Sync {
    /// Run `cmd` to completion or until `timeout` elapses.
    ///
    /// A non-zero exit is returned as `Ok`; callers decide whether it matters.
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}
