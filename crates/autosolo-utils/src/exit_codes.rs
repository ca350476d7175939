//! Exit codes for the `autosolo` binary.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Campaign finished or command succeeded |
//! | 1 | `INTERNAL` | Unexpected failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `RECOVERY_EXHAUSTED` | Recovery procedure ran out of attempts |
//! | 4 | `NAVIGATION_FAILED` | Difficulty switch failed even after recovery |
//! | 5 | `STAGE_RETRIES_EXHAUSTED` | One stage kept failing past the retry cap |
//! | 9 | `LOCK_HELD` | Another instance holds the run lock |
//! | 69 | `DEVICE_UNAVAILABLE` | Device or emulator could not be reached |
//! | 130 | `STOPPED` | Operator requested a stop |

use serde::Serialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const INTERNAL: ExitCode = ExitCode(1);
    pub const CLI_ARGS: ExitCode = ExitCode(2);
    pub const RECOVERY_EXHAUSTED: ExitCode = ExitCode(3);
    pub const NAVIGATION_FAILED: ExitCode = ExitCode(4);
    pub const STAGE_RETRIES_EXHAUSTED: ExitCode = ExitCode(5);
    pub const LOCK_HELD: ExitCode = ExitCode(9);
    pub const DEVICE_UNAVAILABLE: ExitCode = ExitCode(69);
    /// Operator stop; same value shells use for SIGINT.
    pub const STOPPED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Stable machine-readable name for JSON output.
    #[must_use]
    pub fn kind(self) -> ExitKind {
        match self {
            Self::SUCCESS => ExitKind::Success,
            Self::CLI_ARGS => ExitKind::CliArgs,
            Self::RECOVERY_EXHAUSTED => ExitKind::RecoveryExhausted,
            Self::NAVIGATION_FAILED => ExitKind::NavigationFailed,
            Self::STAGE_RETRIES_EXHAUSTED => ExitKind::StageRetriesExhausted,
            Self::LOCK_HELD => ExitKind::LockHeld,
            Self::DEVICE_UNAVAILABLE => ExitKind::DeviceUnavailable,
            Self::STOPPED => ExitKind::Stopped,
            _ => ExitKind::Internal,
        }
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

/// Snake-case names matching the exit code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExitKind {
    Success,
    Internal,
    CliArgs,
    RecoveryExhausted,
    NavigationFailed,
    StageRetriesExhausted,
    LockHeld,
    DeviceUnavailable,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::RECOVERY_EXHAUSTED.as_i32(), 3);
        assert_eq!(ExitCode::NAVIGATION_FAILED.as_i32(), 4);
        assert_eq!(ExitCode::STAGE_RETRIES_EXHAUSTED.as_i32(), 5);
        assert_eq!(ExitCode::LOCK_HELD.as_i32(), 9);
        assert_eq!(ExitCode::DEVICE_UNAVAILABLE.as_i32(), 69);
        assert_eq!(ExitCode::STOPPED.as_i32(), 130);
    }

    #[test]
    fn test_i32_conversions() {
        assert_eq!(ExitCode::from(9), ExitCode::LOCK_HELD);
        assert_eq!(i32::from(ExitCode::STOPPED), 130);
        assert_eq!(ExitCode::from_i32(0), ExitCode::SUCCESS);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ExitCode::LOCK_HELD.kind().to_string(), "lock_held");
        assert_eq!(ExitCode::from_i32(42).kind(), ExitKind::Internal);
        assert_eq!(
            serde_json::to_string(&ExitKind::RecoveryExhausted).unwrap(),
            r#""recovery_exhausted""#
        );
        assert_eq!(ExitKind::from_str("stopped").unwrap(), ExitKind::Stopped);
    }
}
