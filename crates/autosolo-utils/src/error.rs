use std::fmt;
use std::io;
use thiserror::Error;

pub use autosolo_lock::LockError;
pub use autosolo_runner::RunnerError;

use crate::exit_codes::ExitCode;

/// Library-level error type with user-facing reporting.
///
/// | Category | Source |
/// |----------|--------|
/// | `Config` | configuration file or CLI argument errors |
/// | `Campaign` | navigation, battle, recovery and operator stop |
/// | `Device` | adb transport, emulator manager, host processes |
/// | `Vision` | template assets |
/// | `Checkpoint` | persisting progress |
/// | `Lock` | another instance owns the state directory |
///
/// Library code returns `AutosoloError` and never calls `std::process::exit()`;
/// the CLI maps it with [`to_exit_code()`](Self::to_exit_code).
#[derive(Error, Debug)]
pub enum AutosoloError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Template error: {0}")]
    Vision(#[from] VisionError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Run lock error: {0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// User-facing rendering for errors
pub trait UserFriendlyError {
    fn user_message(&self) -> String;

    fn context(&self) -> Option<String>;

    fn suggestions(&self) -> Vec<String>;

    fn category(&self) -> ErrorCategory;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Device,
    Vision,
    Navigation,
    Recovery,
    FileSystem,
    Concurrency,
    OperatorStop,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Device => write!(f, "Device"),
            Self::Vision => write!(f, "Vision"),
            Self::Navigation => write!(f, "Navigation"),
            Self::Recovery => write!(f, "Recovery"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::OperatorStop => write!(f, "Operator Stop"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("The configuration file could not be parsed: {reason}"),
            Self::MissingRequired(key) => format!("Required setting '{key}' is not set"),
            Self::InvalidValue { key, value } => format!("Setting '{key}' has an invalid value: {value}"),
            Self::NotFound { path } => format!("No configuration file at '{path}'"),
            Self::DiscoveryFailed { reason } => {
                format!("Could not search for a configuration file: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some("Configuration is read from .autosolo/config.toml (TOML syntax).".to_string()),
            Self::MissingRequired(_) | Self::InvalidValue { .. } => Some(
                "Values come from CLI flags first, then the config file, then built-in defaults."
                    .to_string(),
            ),
            Self::NotFound { .. } => None,
            Self::DiscoveryFailed { .. } => {
                Some("Discovery walks up from the working directory looking for .autosolo/config.toml.".to_string())
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax (quotes around strings, [section] headers)".to_string(),
                "Run 'autosolo config' to see which file is being loaded".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!("Set '{key}' in .autosolo/config.toml")],
            Self::InvalidValue { key, .. } => vec![
                format!("Fix '{key}' in the config file or the matching CLI flag"),
                "Run 'autosolo config' to see the effective value and where it came from".to_string(),
            ],
            Self::NotFound { .. } => vec!["Check the --config path".to_string()],
            Self::DiscoveryFailed { .. } => vec![
                "Pass the file explicitly with --config <path>".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

// ============================================================================
// Device
// ============================================================================

/// Failures talking to the device, the emulator manager, or host processes
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{0}")]
    Runner(#[from] RunnerError),

    #[error("adb connect to {serial} failed: {output}")]
    ConnectFailed { serial: String, output: String },

    #[error("Device {serial} did not answer the shell probe: {reason}")]
    Unresponsive { serial: String, reason: String },

    #[error("Screen capture could not be decoded: {reason}")]
    CaptureDecode { reason: String },

    #[error("Device did not come back within {timeout_secs}s after reboot")]
    BootTimeout { timeout_secs: u64 },

    #[error("{operation} is not supported by the '{backend}' backend")]
    Unsupported { operation: String, backend: String },

    #[error("{command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
}

impl DeviceError {
    /// Errors that mean the transport itself is gone, as opposed to a single bad command.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Runner(err) => err.is_spawn_failure() || matches!(err, RunnerError::Timeout { .. }),
            Self::ConnectFailed { .. } | Self::Unresponsive { .. } | Self::BootTimeout { .. } => true,
            _ => false,
        }
    }
}

impl UserFriendlyError for DeviceError {
    fn user_message(&self) -> String {
        match self {
            Self::Runner(RunnerError::SpawnFailed { program, .. }) => {
                format!("Could not start '{program}'")
            }
            Self::Runner(RunnerError::Timeout { program, timeout_ms }) => {
                format!("'{program}' did not finish within {timeout_ms} ms")
            }
            Self::Runner(err) => err.to_string(),
            Self::ConnectFailed { serial, .. } => format!("Could not connect to device {serial}"),
            Self::Unresponsive { serial, .. } => format!("Device {serial} is not responding"),
            Self::CaptureDecode { .. } => "The screenshot returned by the device was not a valid PNG".to_string(),
            Self::BootTimeout { timeout_secs } => {
                format!("The emulator did not boot within {timeout_secs} seconds")
            }
            Self::Unsupported { operation, backend } => {
                format!("'{operation}' is not available for emulator backend '{backend}'")
            }
            Self::CommandFailed { command, reason } => format!("'{command}' failed: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Runner(RunnerError::SpawnFailed { reason, .. }) => Some(reason.clone()),
            Self::ConnectFailed { output, .. } => Some(format!("adb said: {output}")),
            Self::Unresponsive { reason, .. } => Some(reason.clone()),
            Self::CaptureDecode { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Runner(RunnerError::SpawnFailed { .. }) => vec![
                "Set device.adb_path (or --adb-path) to the adb executable".to_string(),
                "Run 'autosolo doctor' to check the toolchain".to_string(),
            ],
            Self::ConnectFailed { .. } | Self::Unresponsive { .. } => vec![
                "Make sure the emulator is running and ADB debugging is enabled".to_string(),
                "Check device.serial matches 'adb devices'".to_string(),
            ],
            Self::BootTimeout { .. } => vec![
                "Increase emulator.boot_timeout_secs".to_string(),
                "Check emulator.manager_path and emulator.index".to_string(),
            ],
            Self::Unsupported { .. } => vec![
                "Set emulator.kind to 'ldplayer' or 'mumu' to enable hard reboots".to_string(),
            ],
            _ => vec!["Run 'autosolo doctor' to check device connectivity".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Device
    }
}

// ============================================================================
// Vision
// ============================================================================

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Template '{name}' could not be loaded from {path}: {reason}")]
    TemplateUnreadable {
        name: String,
        path: String,
        reason: String,
    },

    #[error("Assets directory {path} does not exist")]
    AssetsDirMissing { path: String },
}

impl UserFriendlyError for VisionError {
    fn user_message(&self) -> String {
        match self {
            Self::TemplateUnreadable { name, .. } => format!("Template image '{name}' is missing or unreadable"),
            Self::AssetsDirMissing { path } => format!("Template directory '{path}' does not exist"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::TemplateUnreadable { path, reason, .. } => Some(format!("{path}: {reason}")),
            Self::AssetsDirMissing { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Check vision.assets_dir points at the folder holding the template PNGs".to_string(),
            "Template file names are case-sensitive on Linux".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Vision
    }
}

// ============================================================================
// Checkpoint
// ============================================================================

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to write checkpoint {path}: {reason}")]
    Write { path: String, reason: String },
}

impl UserFriendlyError for CheckpointError {
    fn user_message(&self) -> String {
        match self {
            Self::Write { path, .. } => format!("Progress could not be saved to '{path}'"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Write { reason, .. } => Some(reason.clone()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Check that the state directory is writable".to_string(),
            "Ensure sufficient disk space is available".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::FileSystem
    }
}

// ============================================================================
// Campaign
// ============================================================================

/// Everything that can interrupt a stage or the campaign.
///
/// "Not found yet" is never an error; primitives report it as `false`/`None`.
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Emergency stop requested")]
    EmergencyStop,

    #[error("'{target}' not found after scrolling {pages} page(s)")]
    NavigationFailure { target: String, pages: u32 },

    #[error("Expected screen '{template}' not reached ({context})")]
    ScreenNotReached { template: String, context: String },

    #[error("No battle outcome within {timeout_secs}s")]
    BattleTimeout { timeout_secs: u64 },

    #[error("Recovery failed after {attempts} attempt(s)")]
    RecoveryExhausted {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Stage {stage} of tier {tier} failed {failures} time(s) in a row")]
    StageRetriesExhausted { tier: usize, stage: u32, failures: u32 },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Vision(#[from] VisionError),
}

impl CampaignError {
    /// Terminal errors end the run; everything else is retried after recovery.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::EmergencyStop | Self::RecoveryExhausted { .. } | Self::StageRetriesExhausted { .. }
        )
    }

    #[must_use]
    pub fn is_emergency_stop(&self) -> bool {
        matches!(self, Self::EmergencyStop)
    }
}

impl UserFriendlyError for CampaignError {
    fn user_message(&self) -> String {
        match self {
            Self::EmergencyStop => "Run stopped by the operator".to_string(),
            Self::NavigationFailure { target, pages } => {
                format!("Could not find '{target}' after scrolling {pages} page(s)")
            }
            Self::ScreenNotReached { template, context } => {
                format!("Expected to see '{template}' while {context}, but it never appeared")
            }
            Self::BattleTimeout { timeout_secs } => {
                format!("The battle produced no result within {timeout_secs} seconds")
            }
            Self::RecoveryExhausted { attempts, .. } => {
                format!("The game could not be brought back to the lobby after {attempts} recovery attempt(s)")
            }
            Self::StageRetriesExhausted { tier, stage, failures } => {
                format!("Stage {stage} of tier {tier} failed {failures} times in a row")
            }
            Self::Device(err) => err.user_message(),
            Self::Vision(err) => err.user_message(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::EmergencyStop => Some("Progress up to the last completed stage has been saved.".to_string()),
            Self::RecoveryExhausted { last_error, .. } => {
                last_error.as_ref().map(|e| format!("Last attempt failed with: {e}"))
            }
            Self::StageRetriesExhausted { .. } => Some(
                "Each failure ran the full recovery procedure before retrying the stage.".to_string(),
            ),
            Self::Device(err) => err.context(),
            Self::Vision(err) => err.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::EmergencyStop => vec!["Run 'autosolo run' again to resume".to_string()],
            Self::NavigationFailure { .. } | Self::ScreenNotReached { .. } => vec![
                "Check the template images still match the current game UI".to_string(),
                "Use 'autosolo locate <template>' to see the best match score on screen".to_string(),
            ],
            Self::BattleTimeout { .. } => vec!["Increase timing.battle_timeout_secs".to_string()],
            Self::RecoveryExhausted { .. } => vec![
                "Check the crash_reports directory for screenshots of the failure".to_string(),
                "Verify the lobby and overlay templates in [templates]".to_string(),
            ],
            Self::StageRetriesExhausted { .. } => vec![
                "Inspect the crash reports for this stage".to_string(),
                "Raise recovery.stage_retry_limit, or set it to 0 for unbounded retries".to_string(),
            ],
            Self::Device(err) => err.suggestions(),
            Self::Vision(err) => err.suggestions(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::EmergencyStop => ErrorCategory::OperatorStop,
            Self::NavigationFailure { .. } | Self::ScreenNotReached { .. } | Self::BattleTimeout { .. } => {
                ErrorCategory::Navigation
            }
            Self::RecoveryExhausted { .. } | Self::StageRetriesExhausted { .. } => ErrorCategory::Recovery,
            Self::Device(_) => ErrorCategory::Device,
            Self::Vision(_) => ErrorCategory::Vision,
        }
    }
}

// ============================================================================
// Lock
// ============================================================================

impl UserFriendlyError for LockError {
    fn user_message(&self) -> String {
        match self {
            LockError::Held { pid, held_for, .. } => {
                format!("Another autosolo run (PID {pid}) has been active for {held_for}")
            }
            LockError::Corrupted { path, .. } => format!("The run lock '{path}' is unreadable"),
            LockError::AcquisitionFailed { reason } => format!("Could not take the run lock: {reason}"),
            LockError::ReleaseFailed { reason } => format!("Could not release the run lock: {reason}"),
            LockError::Io(err) => format!("Run lock IO failure: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Only one run may use a state directory, so two bots never fight over one device.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            LockError::Held { .. } => vec![
                "Stop the other run first".to_string(),
                "Use --force-lock if you are sure the other process is gone".to_string(),
            ],
            LockError::Corrupted { .. } => vec!["Re-run with --force-lock to replace it".to_string()],
            _ => vec!["Check that the state directory is writable".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Concurrency
    }
}

// ============================================================================
// Top level
// ============================================================================

impl UserFriendlyError for AutosoloError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Campaign(err) => err.user_message(),
            Self::Device(err) => err.user_message(),
            Self::Vision(err) => err.user_message(),
            Self::Checkpoint(err) => err.user_message(),
            Self::Lock(err) => err.user_message(),
            Self::Io(err) => format!("File system operation failed: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Campaign(err) => err.context(),
            Self::Device(err) => err.context(),
            Self::Vision(err) => err.context(),
            Self::Checkpoint(err) => err.context(),
            Self::Lock(err) => err.context(),
            Self::Io(_) => Some("This usually indicates a permissions issue or disk space problem.".to_string()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Campaign(err) => err.suggestions(),
            Self::Device(err) => err.suggestions(),
            Self::Vision(err) => err.suggestions(),
            Self::Checkpoint(err) => err.suggestions(),
            Self::Lock(err) => err.suggestions(),
            Self::Io(_) => vec![
                "Check file permissions for the state directory".to_string(),
                "Ensure sufficient disk space is available".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(err) => err.category(),
            Self::Campaign(err) => err.category(),
            Self::Device(err) => err.category(),
            Self::Vision(err) => err.category(),
            Self::Checkpoint(err) => err.category(),
            Self::Lock(err) => err.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl AutosoloError {
    /// Message, context and suggestions in one block for the terminal.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context if available>
    ///
    /// Suggestions:
    ///   • <suggestion>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Single source of truth for the process exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Vision(_) => ExitCode::CLI_ARGS,
            Self::Lock(LockError::Held { .. }) => ExitCode::LOCK_HELD,
            Self::Lock(_) => ExitCode::INTERNAL,
            Self::Device(err) if err.is_unavailable() => ExitCode::DEVICE_UNAVAILABLE,
            Self::Device(_) => ExitCode::INTERNAL,
            Self::Campaign(err) => match err {
                CampaignError::EmergencyStop => ExitCode::STOPPED,
                CampaignError::RecoveryExhausted { .. } => ExitCode::RECOVERY_EXHAUSTED,
                CampaignError::StageRetriesExhausted { .. } => ExitCode::STAGE_RETRIES_EXHAUSTED,
                CampaignError::NavigationFailure { .. } | CampaignError::ScreenNotReached { .. } => {
                    ExitCode::NAVIGATION_FAILED
                }
                CampaignError::Device(dev) if dev.is_unavailable() => ExitCode::DEVICE_UNAVAILABLE,
                CampaignError::Vision(_) => ExitCode::CLI_ARGS,
                _ => ExitCode::INTERNAL,
            },
            Self::Checkpoint(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(CampaignError::EmergencyStop.is_terminal());
        assert!(
            CampaignError::RecoveryExhausted {
                attempts: 5,
                last_error: None
            }
            .is_terminal()
        );
        assert!(
            CampaignError::StageRetriesExhausted {
                tier: 0,
                stage: 3,
                failures: 10
            }
            .is_terminal()
        );
        assert!(!CampaignError::BattleTimeout { timeout_secs: 1200 }.is_terminal());
        assert!(
            !CampaignError::NavigationFailure {
                target: "A3.png".to_string(),
                pages: 7
            }
            .is_terminal()
        );
        assert!(
            !CampaignError::ScreenNotReached {
                template: "change.png".to_string(),
                context: "opening the stage switcher".to_string()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_exit_code_mapping() {
        let cases: Vec<(AutosoloError, ExitCode)> = vec![
            (
                ConfigError::InvalidValue {
                    key: "vision.confidence".to_string(),
                    value: "1.5".to_string(),
                }
                .into(),
                ExitCode::CLI_ARGS,
            ),
            (CampaignError::EmergencyStop.into(), ExitCode::STOPPED),
            (
                CampaignError::RecoveryExhausted {
                    attempts: 5,
                    last_error: Some("boom".to_string()),
                }
                .into(),
                ExitCode::RECOVERY_EXHAUSTED,
            ),
            (
                CampaignError::NavigationFailure {
                    target: "diff_2.png".to_string(),
                    pages: 5,
                }
                .into(),
                ExitCode::NAVIGATION_FAILED,
            ),
            (
                CampaignError::StageRetriesExhausted {
                    tier: 1,
                    stage: 2,
                    failures: 10,
                }
                .into(),
                ExitCode::STAGE_RETRIES_EXHAUSTED,
            ),
            (
                LockError::Held {
                    state_dir: ".autosolo".to_string(),
                    pid: 42,
                    held_for: "1m".to_string(),
                }
                .into(),
                ExitCode::LOCK_HELD,
            ),
            (
                DeviceError::BootTimeout { timeout_secs: 180 }.into(),
                ExitCode::DEVICE_UNAVAILABLE,
            ),
            (
                DeviceError::CaptureDecode {
                    reason: "bad png".to_string(),
                }
                .into(),
                ExitCode::INTERNAL,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_exit_code(), expected, "wrong exit code for {err}");
        }
    }

    #[test]
    fn test_spawn_failure_counts_as_unavailable() {
        let err = DeviceError::Runner(RunnerError::SpawnFailed {
            program: "adb".to_string(),
            reason: "No such file or directory".to_string(),
        });
        assert!(err.is_unavailable());
        let wrapped = AutosoloError::Campaign(CampaignError::Device(err));
        assert_eq!(wrapped.to_exit_code(), ExitCode::DEVICE_UNAVAILABLE);
    }

    #[test]
    fn test_display_for_user_sections() {
        let err = AutosoloError::Campaign(CampaignError::RecoveryExhausted {
            attempts: 5,
            last_error: Some("lobby not reached".to_string()),
        });
        let rendered = err.display_for_user();
        assert!(rendered.starts_with("Error: "));
        assert!(rendered.contains("5 recovery attempt(s)"));
        assert!(rendered.contains("Context: Last attempt failed with: lobby not reached"));
        assert!(rendered.contains("Suggestions:"));
        assert!(rendered.contains("  • "));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            AutosoloError::Campaign(CampaignError::EmergencyStop).category(),
            ErrorCategory::OperatorStop
        );
        assert_eq!(
            AutosoloError::Vision(VisionError::AssetsDirMissing {
                path: "assets".to_string()
            })
            .category(),
            ErrorCategory::Vision
        );
        assert_eq!(ErrorCategory::FileSystem.to_string(), "File System");
    }
}
