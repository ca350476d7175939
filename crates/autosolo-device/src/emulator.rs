//! Emulator manager backends used by the hard-reboot path.
//!
//! Each backend is just a pair of manager CLI invocations; host process
//! cleanup is handled separately in [`crate::host`].

use autosolo_config::{EmulatorConfig, EmulatorKind};
use autosolo_runner::{CommandSpec, ProcessRunner};
use autosolo_utils::error::DeviceError;
use camino::Utf8PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorManager {
    kind: EmulatorKind,
    manager_path: Option<Utf8PathBuf>,
    index: u32,
}

impl EmulatorManager {
    #[must_use]
    pub fn new(kind: EmulatorKind, manager_path: Option<Utf8PathBuf>, index: u32) -> Self {
        Self {
            kind,
            manager_path,
            index,
        }
    }

    #[must_use]
    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::new(config.kind, config.manager_path.clone(), config.index)
    }

    #[must_use]
    pub fn kind(&self) -> EmulatorKind {
        self.kind
    }

    fn unsupported(&self, operation: &str) -> DeviceError {
        DeviceError::Unsupported {
            operation: operation.to_string(),
            backend: self.kind.to_string(),
        }
    }

    /// `ldconsole quit --index N` / `MuMuManager control -v N shutdown`
    #[must_use]
    pub fn shutdown_command(&self) -> Option<CommandSpec> {
        self.command("quit", "shutdown")
    }

    /// `ldconsole launch --index N` / `MuMuManager control -v N launch`
    #[must_use]
    pub fn launch_command(&self) -> Option<CommandSpec> {
        self.command("launch", "launch")
    }

    fn command(&self, ld_verb: &str, mumu_verb: &str) -> Option<CommandSpec> {
        let path = self.manager_path.as_ref()?;
        let index = self.index.to_string();
        match self.kind {
            EmulatorKind::None => None,
            EmulatorKind::LdPlayer => Some(
                CommandSpec::new(path.as_str())
                    .arg(ld_verb)
                    .args(["--index", index.as_str()]),
            ),
            EmulatorKind::MuMu => Some(
                CommandSpec::new(path.as_str())
                    .args(["control", "-v", index.as_str()])
                    .arg(mumu_verb),
            ),
        }
    }

    /// Ask the manager to stop the instance. A timeout is not an error: the
    /// caller kills the backend processes afterwards regardless.
    pub fn shutdown(&self, runner: &dyn ProcessRunner, timeout: Duration) -> Result<(), DeviceError> {
        let cmd = self
            .shutdown_command()
            .ok_or_else(|| self.unsupported("manager_shutdown"))?;
        info!(command = %cmd.display(), "Requesting emulator shutdown");
        match runner.run(&cmd, timeout) {
            Ok(output) => {
                debug!(exit_code = ?output.exit_code, "Emulator shutdown command finished");
                Ok(())
            }
            Err(autosolo_runner::RunnerError::Timeout { timeout_ms, .. }) => {
                debug!(timeout_ms, "Emulator shutdown command timed out");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the instance. Returns once the manager command exits; the device
    /// is usually not reachable yet.
    pub fn launch(&self, runner: &dyn ProcessRunner, timeout: Duration) -> Result<(), DeviceError> {
        let cmd = self
            .launch_command()
            .ok_or_else(|| self.unsupported("manager_launch"))?;
        info!(command = %cmd.display(), "Launching emulator");
        runner.run(&cmd, timeout)?.into_success(&cmd)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_runner::{ProcessOutput, RunnerError};
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        timeout: bool,
    }

    impl ProcessRunner for Recorder {
        fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            self.seen.lock().unwrap().push(cmd.display());
            if self.timeout {
                return Err(RunnerError::Timeout {
                    program: cmd.program_name(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            Ok(ProcessOutput::new(Vec::new(), Vec::new(), Some(0)))
        }
    }

    #[test]
    fn test_ldplayer_commands() {
        let manager = EmulatorManager::new(
            EmulatorKind::LdPlayer,
            Some(Utf8PathBuf::from("ldconsole")),
            2,
        );
        assert_eq!(
            manager.shutdown_command().unwrap().display(),
            "ldconsole quit --index 2"
        );
        assert_eq!(
            manager.launch_command().unwrap().display(),
            "ldconsole launch --index 2"
        );
    }

    #[test]
    fn test_mumu_commands() {
        let manager =
            EmulatorManager::new(EmulatorKind::MuMu, Some(Utf8PathBuf::from("MuMuManager")), 0);
        assert_eq!(
            manager.shutdown_command().unwrap().display(),
            "MuMuManager control -v 0 shutdown"
        );
        assert_eq!(
            manager.launch_command().unwrap().display(),
            "MuMuManager control -v 0 launch"
        );
    }

    #[test]
    fn test_unmanaged_backend_is_unsupported() {
        let manager = EmulatorManager::new(EmulatorKind::None, None, 0);
        let runner = Recorder {
            seen: Mutex::new(Vec::new()),
            timeout: false,
        };
        let err = manager.launch(&runner, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DeviceError::Unsupported { .. }));
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_timeout_is_tolerated() {
        let manager = EmulatorManager::new(
            EmulatorKind::LdPlayer,
            Some(Utf8PathBuf::from("ldconsole")),
            0,
        );
        let runner = Recorder {
            seen: Mutex::new(Vec::new()),
            timeout: true,
        };
        manager.shutdown(&runner, Duration::from_millis(10)).unwrap();
        assert!(manager.launch(&runner, Duration::from_millis(10)).is_err());
    }
}
