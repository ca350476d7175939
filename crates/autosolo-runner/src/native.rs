use std::process::Stdio;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::RunnerError;
use crate::{CommandSpec, ProcessOutput, ProcessRunner};

/// Runs host processes directly with `std::process::Command`.
///
/// The timeout is enforced by waiting on a helper thread; when it fires the
/// child is killed (SIGKILL on Unix, `TerminateProcess` on Windows) so a hung
/// `adb` never stalls the campaign loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner;

impl NativeRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn terminate_process(pid: u32) {
        #[cfg(unix)]
        {
            // SAFETY: kill(2) with a pid we spawned; a stale pid only yields ESRCH.
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }

        #[cfg(windows)]
        {
            use windows::Win32::Foundation::CloseHandle;
            use windows::Win32::System::Threading::{
                OpenProcess, PROCESS_TERMINATE, TerminateProcess,
            };

            unsafe {
                if let Ok(handle) = OpenProcess(PROCESS_TERMINATE, false, pid) {
                    let _ = TerminateProcess(handle, 1);
                    let _ = CloseHandle(handle);
                }
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = pid;
        }
    }
}

impl ProcessRunner for NativeRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %cmd.display(), timeout_ms = timeout.as_millis() as u64, "Spawning process");

        let child = command.spawn().map_err(|e| RunnerError::SpawnFailed {
            program: cmd.program_name(),
            reason: e.to_string(),
        })?;

        let child_id = child.id();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let _ = tx.send(child.wait_with_output());
        });

        match rx.recv_timeout(timeout) {
            Ok(output_result) => {
                let _ = handle.join();
                let output = output_result.map_err(|e| RunnerError::WaitFailed {
                    program: cmd.program_name(),
                    reason: e.to_string(),
                })?;
                Ok(ProcessOutput::new(
                    output.stdout,
                    output.stderr,
                    output.status.code(),
                ))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(command = %cmd.display(), pid = child_id, "Process timed out, killing");
                Self::terminate_process(child_id);
                let _ = handle.join();
                Err(RunnerError::Timeout {
                    program: cmd.display(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RunnerError::WaitFailed {
                program: cmd.program_name(),
                reason: "process monitoring thread terminated unexpectedly".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_runner_is_zero_sized() {
        let runner = NativeRunner::new();
        assert_eq!(std::mem::size_of_val(&runner), 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_native_runner_echo() {
        let output = NativeRunner::new()
            .run(&CommandSpec::new("echo").arg("ok"), Duration::from_secs(10))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_string().trim(), "ok");
    }

    #[test]
    #[cfg(unix)]
    fn test_native_runner_does_not_interpret_metacharacters() {
        let output = NativeRunner::new()
            .run(
                &CommandSpec::new("echo").arg("a; echo b"),
                Duration::from_secs(10),
            )
            .unwrap();
        assert_eq!(output.stdout_string().trim(), "a; echo b");
    }

    #[test]
    #[cfg(unix)]
    fn test_native_runner_timeout_kills_process() {
        let started = std::time::Instant::now();
        let result = NativeRunner::new().run(
            &CommandSpec::new("sleep").arg("30"),
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_native_runner_missing_binary() {
        let result = NativeRunner::new().run(
            &CommandSpec::new("definitely-not-an-installed-adb-binary"),
            Duration::from_secs(5),
        );
        match result {
            Err(err) => assert!(err.is_spawn_failure()),
            Ok(_) => panic!("missing binary should fail to spawn"),
        }
    }
}
