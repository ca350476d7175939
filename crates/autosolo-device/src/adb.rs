//! ADB-backed [`DeviceControl`].
//!
//! Every call is one `adb` invocation through a [`ProcessRunner`], with the
//! command timeout from `[device]`. Shell commands are handed to adb as a
//! single argv element; nothing is interpreted by a host shell.

use autosolo_config::Config;
use autosolo_runner::{CommandSpec, ProcessRunner};
use autosolo_utils::error::DeviceError;
use autosolo_utils::types::{Point, Swipe};
use camino::Utf8Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{DeviceControl, EmulatorManager, Frame, host};

/// Anything shorter cannot be a PNG screenshot.
const MIN_CAPTURE_BYTES: usize = 100;

pub struct AdbDevice {
    adb_path: String,
    serial: Option<String>,
    package: Option<String>,
    command_timeout: Duration,
    capture_timeout: Duration,
    boot_command_timeout: Duration,
    emulator: EmulatorManager,
    process_names: Vec<String>,
    runner: Arc<dyn ProcessRunner>,
}

impl AdbDevice {
    #[must_use]
    pub fn from_config(config: &Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            adb_path: config.device.adb_path.clone(),
            serial: config.device.serial.clone(),
            package: config.device.package.clone(),
            command_timeout: config.device.command_timeout(),
            capture_timeout: config.device.capture_timeout(),
            boot_command_timeout: Duration::from_secs(config.emulator.shutdown_timeout_secs.max(30)),
            emulator: EmulatorManager::from_config(&config.emulator),
            process_names: config.emulator_process_names(),
            runner,
        }
    }

    /// Label for logs and errors.
    #[must_use]
    pub fn serial_label(&self) -> &str {
        self.serial.as_deref().unwrap_or("<default>")
    }

    fn adb(&self) -> CommandSpec {
        CommandSpec::new(&self.adb_path).arg_pair_if("-s", self.serial.as_deref())
    }

    fn exec(&self, cmd: &CommandSpec, timeout: Duration) -> Result<Vec<u8>, DeviceError> {
        trace!(command = %cmd.display(), "adb");
        let output = self.runner.run(cmd, timeout)?.into_success(cmd)?;
        Ok(output.stdout)
    }

    fn run_shell_with_timeout(&self, command: &str, timeout: Duration) -> Result<String, DeviceError> {
        let cmd = self.adb().args(["shell", command]);
        let stdout = self.exec(&cmd, timeout)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn package(&self, operation: &str) -> Result<&str, DeviceError> {
        self.package.as_deref().ok_or_else(|| DeviceError::CommandFailed {
            command: operation.to_string(),
            reason: "device.package is not set".to_string(),
        })
    }
}

impl DeviceControl for AdbDevice {
    fn capture_screen(&self) -> Result<Frame, DeviceError> {
        // exec-out streams raw bytes, so no CRLF translation on Windows hosts
        let cmd = self.adb().args(["exec-out", "screencap", "-p"]);
        let bytes = self.exec(&cmd, self.capture_timeout)?;
        if bytes.len() < MIN_CAPTURE_BYTES {
            return Err(DeviceError::CaptureDecode {
                reason: format!(
                    "only {} bytes returned: {}",
                    bytes.len(),
                    String::from_utf8_lossy(&bytes).trim()
                ),
            });
        }
        Frame::from_png(&bytes)
    }

    fn tap(&self, at: Point) -> Result<(), DeviceError> {
        self.run_shell(&format!("input tap {} {}", at.x, at.y))?;
        Ok(())
    }

    fn swipe(&self, swipe: Swipe) -> Result<(), DeviceError> {
        self.run_shell(&format!(
            "input swipe {} {} {} {} {}",
            swipe.from.x, swipe.from.y, swipe.to.x, swipe.to.y, swipe.duration_ms
        ))?;
        Ok(())
    }

    fn run_shell(&self, command: &str) -> Result<String, DeviceError> {
        self.run_shell_with_timeout(command, self.command_timeout)
    }

    fn stop_app(&self) -> Result<(), DeviceError> {
        let package = self.package("stop_app")?;
        debug!(package, "Force-stopping app");
        self.run_shell(&format!("am force-stop {package}"))?;
        Ok(())
    }

    fn start_app(&self) -> Result<(), DeviceError> {
        let package = self.package("start_app")?;
        debug!(package, "Launching app");
        self.run_shell(&format!(
            "monkey -p {package} -c android.intent.category.LAUNCHER 1"
        ))?;
        Ok(())
    }

    /// `adb connect` for network serials (`host:port`); USB devices need nothing.
    fn connect(&self) -> Result<(), DeviceError> {
        let Some(serial) = self.serial.as_deref().filter(|s| s.contains(':')) else {
            return Ok(());
        };
        let cmd = CommandSpec::new(&self.adb_path).args(["connect", serial]);
        let stdout = self.exec(&cmd, self.command_timeout)?;
        let text = String::from_utf8_lossy(&stdout).trim().to_string();
        // "connected to" and "already connected to" both count
        if text.contains("connected to") {
            Ok(())
        } else {
            Err(DeviceError::ConnectFailed {
                serial: serial.to_string(),
                output: text,
            })
        }
    }

    fn kill_process_by_name(&self, name: &str) -> usize {
        host::kill_processes_named(name)
    }

    fn backend_process_names(&self) -> Vec<String> {
        self.process_names.clone()
    }

    fn manager_shutdown(&self, timeout: Duration) -> Result<(), DeviceError> {
        self.emulator.shutdown(self.runner.as_ref(), timeout)
    }

    fn manager_launch(&self) -> Result<(), DeviceError> {
        self.emulator
            .launch(self.runner.as_ref(), self.boot_command_timeout)
    }

    fn record_screen(&self, remote: &str, duration: Duration) -> Result<(), DeviceError> {
        let secs = duration.as_secs().max(1);
        self.run_shell_with_timeout(
            &format!("screenrecord --time-limit {secs} {remote}"),
            duration + self.command_timeout,
        )?;
        Ok(())
    }

    fn pull_file(&self, remote: &str, local: &Utf8Path) -> Result<(), DeviceError> {
        let cmd = self.adb().args(["pull", remote, local.as_str()]);
        self.exec(&cmd, self.capture_timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_runner::{ProcessOutput, RunnerError};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Replies to each command with the first scripted output whose prefix matches.
    struct ScriptedRunner {
        replies: Vec<(&'static str, ProcessOutput)>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(replies: Vec<(&'static str, ProcessOutput)>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, cmd: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            let line = cmd.display();
            self.seen.lock().unwrap().push(line.clone());
            Ok(self
                .replies
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix))
                .map(|(_, out)| out.clone())
                .unwrap_or_else(|| ProcessOutput::new(Vec::new(), Vec::new(), Some(0))))
        }
    }

    fn ok(stdout: &[u8]) -> ProcessOutput {
        ProcessOutput::new(stdout.to_vec(), Vec::new(), Some(0))
    }

    fn device(runner: Arc<ScriptedRunner>) -> AdbDevice {
        let config = Config::builder()
            .serial("127.0.0.1:5555")
            .package("com.example.game")
            .build()
            .unwrap();
        AdbDevice::from_config(&config, runner)
    }

    #[test]
    fn test_tap_and_swipe_commands() {
        let runner = ScriptedRunner::new(Vec::new());
        let dev = device(runner.clone());
        dev.tap(Point::new(10, 20)).unwrap();
        dev.swipe(Swipe::new(Point::new(500, 900), Point::new(500, 200), 500))
            .unwrap();
        assert_eq!(
            runner.seen(),
            vec![
                "adb -s 127.0.0.1:5555 shell input tap 10 20",
                "adb -s 127.0.0.1:5555 shell input swipe 500 900 500 200 500",
            ]
        );
    }

    #[test]
    fn test_app_restart_commands() {
        let runner = ScriptedRunner::new(Vec::new());
        let dev = device(runner.clone());
        dev.stop_app().unwrap();
        dev.start_app().unwrap();
        let seen = runner.seen();
        assert!(seen[0].ends_with("am force-stop com.example.game"));
        assert!(seen[1].ends_with("monkey -p com.example.game -c android.intent.category.LAUNCHER 1"));
    }

    #[test]
    fn test_start_app_without_package_fails() {
        let runner = ScriptedRunner::new(Vec::new());
        let dev = AdbDevice::from_config(&Config::default(), runner.clone());
        assert!(matches!(
            dev.start_app(),
            Err(DeviceError::CommandFailed { .. })
        ));
        assert!(runner.seen().is_empty());
    }

    #[test]
    fn test_capture_decodes_png() {
        let png = Frame::from_rgb(RgbImage::from_pixel(40, 30, Rgb([9, 9, 9])))
            .to_png()
            .unwrap();
        let reply: &'static [u8] = Box::leak(png.into_boxed_slice());
        let runner = ScriptedRunner::new(vec![("adb -s 127.0.0.1:5555 exec-out", ok(reply))]);
        let frame = device(runner).capture_screen().unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 30));
    }

    #[test]
    fn test_short_capture_is_error() {
        let runner = ScriptedRunner::new(vec![("adb -s 127.0.0.1:5555 exec-out", ok(b"offline"))]);
        assert!(matches!(
            device(runner).capture_screen(),
            Err(DeviceError::CaptureDecode { .. })
        ));
    }

    #[test]
    fn test_connect_checks_output() {
        let runner = ScriptedRunner::new(vec![("adb connect", ok(b"already connected to 127.0.0.1:5555\n"))]);
        device(runner).connect().unwrap();

        let runner = ScriptedRunner::new(vec![("adb connect", ok(b"failed to connect to 127.0.0.1:5555\n"))]);
        assert!(matches!(
            device(runner).connect(),
            Err(DeviceError::ConnectFailed { .. })
        ));
    }

    #[test]
    fn test_nonzero_exit_is_runner_error() {
        let runner = ScriptedRunner::new(vec![(
            "adb -s 127.0.0.1:5555 shell",
            ProcessOutput::new(Vec::new(), b"error: device offline".to_vec(), Some(1)),
        )]);
        let err = device(runner).run_shell("echo ready").unwrap_err();
        assert!(matches!(err, DeviceError::Runner(RunnerError::NonZeroExit { .. })));
    }

    #[test]
    fn test_pull_file_command() {
        let runner = ScriptedRunner::new(Vec::new());
        let dev = device(runner.clone());
        dev.pull_file("/sdcard/x.mp4", Utf8Path::new("out/x.mp4")).unwrap();
        assert_eq!(runner.seen(), vec!["adb -s 127.0.0.1:5555 pull /sdcard/x.mp4 out/x.mp4"]);
    }
}
