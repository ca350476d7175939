use autosolo_utils::error::{AutosoloError, ErrorCategory, UserFriendlyError};
use std::fmt;

/// Terminal rendering of an [`AutosoloError`].
pub struct ErrorReport<'a> {
    error: &'a AutosoloError,
}

impl<'a> ErrorReport<'a> {
    #[must_use]
    pub fn new(error: &'a AutosoloError) -> Self {
        Self { error }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }

    #[must_use]
    pub fn format(&self) -> String {
        let mut out = format!("✗ [{}] ", self.category());
        out.push_str(&self.error.display_for_user());
        out.push_str(&format!(
            "\nExit code: {} ({})\n",
            self.error.to_exit_code().as_i32(),
            self.error.to_exit_code().kind()
        ));
        out
    }
}

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// [`ErrorReport`] plus hints specific to the command that failed.
#[must_use]
pub fn create_contextual_report(error: &AutosoloError, operation: &str) -> String {
    let mut out = ErrorReport::new(error).format();

    let hints: &[&str] = match (operation, error.category()) {
        ("run", ErrorCategory::Recovery | ErrorCategory::Navigation) => &[
            "Progress up to the last completed stage is kept; 'autosolo run' resumes from it",
            "'autosolo status' shows the saved checkpoint",
        ],
        ("run" | "doctor" | "locate", ErrorCategory::Device) => &[
            "'autosolo doctor' checks adb, the device connection and screen capture",
        ],
        ("config", _) => &["'autosolo config' prints every effective value and its source"],
        ("reset" | "status", ErrorCategory::FileSystem) => &[
            "The checkpoint lives under AUTOSOLO_HOME (default ./.autosolo)",
        ],
        _ => &[],
    };

    if !hints.is_empty() {
        out.push_str(&format!("\nWhile running '{operation}':\n"));
        for hint in hints {
            out.push_str(&format!("  - {hint}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_utils::error::{CampaignError, ConfigError};

    #[test]
    fn test_report_includes_category_and_exit_code() {
        let err = AutosoloError::Campaign(CampaignError::RecoveryExhausted {
            attempts: 5,
            last_error: Some("lobby not found".to_string()),
        });
        let text = ErrorReport::new(&err).format();
        assert!(text.contains("[Recovery]"));
        assert!(text.contains("5 recovery attempt"));
        assert!(text.contains("lobby not found"));
        assert!(text.contains("Exit code: 3"));
    }

    #[test]
    fn test_contextual_report_adds_run_hints() {
        let err = AutosoloError::Campaign(CampaignError::NavigationFailure {
            target: "diff_3.png".to_string(),
            pages: 5,
        });
        let text = create_contextual_report(&err, "run");
        assert!(text.contains("While running 'run'"));
        assert!(text.contains("resumes"));
    }

    #[test]
    fn test_contextual_report_without_hints() {
        let err = AutosoloError::Config(ConfigError::MissingRequired("device.package".to_string()));
        let text = create_contextual_report(&err, "status");
        assert!(!text.contains("While running"));
        assert!(text.contains("device.package"));
    }
}
