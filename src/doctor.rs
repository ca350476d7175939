//! Environment health checks for `autosolo doctor`.
//!
//! Every check runs regardless of earlier failures so one invocation shows the
//! whole picture. Output is sorted by check name for stable JSON.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use autosolo_device::{DeviceControl, TemplateMatcher};
use autosolo_engine::templates::CampaignTemplates;

use crate::{Config, RunLock};

/// Probe sent over `adb shell` to prove the device answers.
pub const READY_PROBE: &str = "autosolo-ready";

/// Doctor output (schema v1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOutput {
    pub schema_version: String,
    pub emitted_at: DateTime<Utc>,
    /// False if any check failed; warnings keep it true
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            details: details.into(),
        }
    }
}

pub struct DoctorCommand<'a> {
    config: &'a Config,
    device: Arc<dyn DeviceControl>,
}

impl<'a> DoctorCommand<'a> {
    pub fn new(config: &'a Config, device: Arc<dyn DeviceControl>) -> Self {
        Self { config, device }
    }

    pub fn run(&self) -> DoctorOutput {
        let mut checks = vec![
            self.check_adb_path(),
            self.check_device_connect(),
            self.check_screen_capture(),
            self.check_templates(),
            self.check_app_package(),
            self.check_emulator_manager(),
            self.check_run_lock(),
        ];
        checks.sort_by(|a, b| a.name.cmp(&b.name));

        let ok = !checks.iter().any(|c| c.status == CheckStatus::Fail);
        DoctorOutput {
            schema_version: "1".to_string(),
            emitted_at: Utc::now(),
            ok,
            checks,
        }
    }

    fn check_adb_path(&self) -> DoctorCheck {
        let adb = &self.config.device.adb_path;
        match which::which(adb) {
            Ok(path) => DoctorCheck::new(
                "adb_path",
                CheckStatus::Pass,
                format!("Found adb at {}", path.display()),
            ),
            Err(e) => DoctorCheck::new(
                "adb_path",
                CheckStatus::Fail,
                format!("'{adb}' not found: {e}. Install platform-tools or set device.adb_path"),
            ),
        }
    }

    fn check_device_connect(&self) -> DoctorCheck {
        let probe = self.device.connect().and_then(|()| {
            self.device.run_shell(&format!("echo {READY_PROBE}"))
        });
        match probe {
            Ok(output) if output.trim() == READY_PROBE => {
                DoctorCheck::new("device_connect", CheckStatus::Pass, "Device answered the shell probe")
            }
            Ok(output) => DoctorCheck::new(
                "device_connect",
                CheckStatus::Fail,
                format!("Unexpected probe reply: '{}'", output.trim()),
            ),
            Err(e) => DoctorCheck::new("device_connect", CheckStatus::Fail, e.to_string()),
        }
    }

    fn check_screen_capture(&self) -> DoctorCheck {
        match self.device.capture_screen() {
            Ok(frame) => DoctorCheck::new(
                "screen_capture",
                CheckStatus::Pass,
                format!("Captured {}x{} frame", frame.width(), frame.height()),
            ),
            Err(e) => DoctorCheck::new("screen_capture", CheckStatus::Fail, e.to_string()),
        }
    }

    fn check_templates(&self) -> DoctorCheck {
        let names = CampaignTemplates::from_config(self.config).names();
        let matcher = TemplateMatcher::new(self.config.assets_dir());
        match matcher.library().preload(names.iter().map(String::as_str)) {
            Ok(()) => DoctorCheck::new(
                "templates",
                CheckStatus::Pass,
                format!("{} templates readable from {}", names.len(), self.config.assets_dir()),
            ),
            Err(e) => DoctorCheck::new("templates", CheckStatus::Fail, e.to_string()),
        }
    }

    fn check_app_package(&self) -> DoctorCheck {
        match &self.config.device.package {
            Some(package) => DoctorCheck::new("app_package", CheckStatus::Pass, package.clone()),
            None => DoctorCheck::new(
                "app_package",
                CheckStatus::Warn,
                "device.package is not set; recovery cannot restart the app",
            ),
        }
    }

    fn check_emulator_manager(&self) -> DoctorCheck {
        let emulator = &self.config.emulator;
        if !emulator.kind.is_managed() {
            return DoctorCheck::new(
                "emulator_manager",
                CheckStatus::Warn,
                "No emulator manager configured; a hard reboot only reconnects adb",
            );
        }
        match &emulator.manager_path {
            Some(path) if path.is_file() => DoctorCheck::new(
                "emulator_manager",
                CheckStatus::Pass,
                format!("{} console at {path}", emulator.kind),
            ),
            Some(path) => DoctorCheck::new(
                "emulator_manager",
                CheckStatus::Fail,
                format!("{} console not found at {path}", emulator.kind),
            ),
            None => DoctorCheck::new(
                "emulator_manager",
                CheckStatus::Fail,
                "emulator.manager_path is not set",
            ),
        }
    }

    fn check_run_lock(&self) -> DoctorCheck {
        match RunLock::inspect(&self.config.state_dir()) {
            Ok(None) => DoctorCheck::new("run_lock", CheckStatus::Pass, "No other instance is running"),
            Ok(Some(info)) => DoctorCheck::new(
                "run_lock",
                CheckStatus::Warn,
                format!("Lock file present (PID {}, since {})", info.pid, info.created_at),
            ),
            Err(e) => DoctorCheck::new("run_lock", CheckStatus::Warn, e.to_string()),
        }
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Human-readable doctor report on stdout.
pub fn print_doctor_report(report: &DoctorOutput) {
    print!("{}", render_doctor_report(report, use_color()));
}

fn render_doctor_report(report: &DoctorOutput, use_colors: bool) -> String {
    use crossterm::style::{Attribute, Color, Stylize};

    let style = |text: &str, color: Color, bold: bool| -> String {
        if use_colors {
            let mut styled = text.with(color);
            if bold {
                styled = styled.attribute(Attribute::Bold);
            }
            format!("{styled}")
        } else {
            text.to_string()
        }
    };

    let mut out = String::new();
    out.push_str(&style("autosolo environment check", Color::Cyan, true));
    out.push_str("\n\n");

    let (mut pass, mut warn, mut fail) = (0, 0, 0);
    for check in &report.checks {
        let symbol = match check.status {
            CheckStatus::Pass => {
                pass += 1;
                style("✓", Color::Green, false)
            }
            CheckStatus::Warn => {
                warn += 1;
                style("⚠", Color::Yellow, false)
            }
            CheckStatus::Fail => {
                fail += 1;
                style("✗", Color::Red, true)
            }
        };
        out.push_str(&format!("  {symbol} {:<18} {}\n", check.name, check.details));
    }

    out.push_str(&format!("\n{pass} passed, {warn} warnings, {fail} failed\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_engine::testing::FakeDevice;
    use autosolo_utils::paths::with_isolated_home;

    fn status_of<'a>(output: &'a DoctorOutput, name: &str) -> &'a DoctorCheck {
        output
            .checks
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing check {name}"))
    }

    #[test]
    fn test_checks_are_sorted_and_complete() {
        let _home = with_isolated_home();
        let config = Config::default();
        let output = DoctorCommand::new(&config, Arc::new(FakeDevice::new())).run();

        let names: Vec<_> = output.checks.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 7);
        assert_eq!(output.schema_version, "1");
    }

    #[test]
    fn test_device_probe_and_capture_pass_on_responsive_device() {
        let _home = with_isolated_home();
        let config = Config::default();
        let output = DoctorCommand::new(&config, Arc::new(FakeDevice::new())).run();

        assert_eq!(status_of(&output, "device_connect").status, CheckStatus::Pass);
        assert_eq!(status_of(&output, "screen_capture").status, CheckStatus::Pass);
        assert_eq!(status_of(&output, "app_package").status, CheckStatus::Warn);
    }

    #[test]
    fn test_unreachable_device_fails_overall() {
        let _home = with_isolated_home();
        let config = Config::default();
        let device = FakeDevice::new();
        device.fail_connects(1);
        device.fail_captures(1);
        let output = DoctorCommand::new(&config, Arc::new(device)).run();

        assert_eq!(status_of(&output, "device_connect").status, CheckStatus::Fail);
        assert_eq!(status_of(&output, "screen_capture").status, CheckStatus::Fail);
        assert!(!output.ok);
    }

    #[test]
    fn test_missing_assets_fail_templates_check() {
        let home = with_isolated_home();
        let mut config = Config::default();
        config.vision.assets_dir = home.home().join("no-such-assets");
        let output = DoctorCommand::new(&config, Arc::new(FakeDevice::new())).run();

        assert_eq!(status_of(&output, "templates").status, CheckStatus::Fail);
    }

    fn sample_report() -> DoctorOutput {
        DoctorOutput {
            schema_version: "1".to_string(),
            emitted_at: Utc::now(),
            ok: false,
            checks: vec![
                DoctorCheck::new("adb_path", CheckStatus::Pass, "Found adb"),
                DoctorCheck::new("app_package", CheckStatus::Warn, "not set"),
                DoctorCheck::new("device_connect", CheckStatus::Fail, "offline"),
            ],
        }
    }

    #[test]
    fn test_plain_report_has_no_escape_codes() {
        let text = render_doctor_report(&sample_report(), false);

        assert!(!text.contains('\x1b'));
        assert!(text.contains("  ✗ device_connect"));
        assert!(text.ends_with("1 passed, 1 warnings, 1 failed\n"));
    }

    #[test]
    fn test_colored_report_styles_symbols() {
        use crossterm::style::{Color, Stylize};

        let text = render_doctor_report(&sample_report(), true);

        assert!(text.contains(&format!("{}", "✓".with(Color::Green))));
        assert!(text.contains(&format!("{}", "⚠".with(Color::Yellow))));
        assert!(text.contains("app_package"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let check = DoctorCheck::new("adb_path", CheckStatus::Warn, "x");
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["status"], "warn");
    }
}
