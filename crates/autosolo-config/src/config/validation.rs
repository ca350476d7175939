use autosolo_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn check_threshold(key: &str, value: f32) -> Result<(), ConfigError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(invalid(key, format!("{value} must be in (0, 1]")));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.campaign.difficulties.is_empty() {
            return Err(invalid("campaign.difficulties", "must list at least one tier"));
        }
        if self.campaign.total_stages == 0 {
            return Err(invalid("campaign.total_stages", "must be greater than 0"));
        }
        if !self.campaign.stage_template.contains("{n}") {
            return Err(invalid(
                "campaign.stage_template",
                format!("'{}' must contain {{n}}", self.campaign.stage_template),
            ));
        }
        if self.campaign.secondary_pack_from == 0 {
            return Err(invalid("campaign.secondary_pack_from", "must be greater than 0"));
        }

        check_threshold("vision.confidence", self.vision.confidence)?;
        check_threshold("timing.difficulty_threshold", self.timing.difficulty_threshold)?;
        check_threshold("campaign.stage_threshold", self.campaign.stage_threshold)?;
        for spec in self.templates.all() {
            if spec.file.trim().is_empty() {
                return Err(invalid("templates", "template file names must not be empty"));
            }
            if let Some(threshold) = spec.threshold {
                check_threshold(&format!("templates ({})", spec.file), threshold)?;
            }
        }

        for (i, event) in self.critical_events.iter().enumerate() {
            if event.trigger.trim().is_empty() || event.action.trim().is_empty() {
                return Err(invalid(
                    &format!("critical_events[{i}]"),
                    "trigger and action must both be set",
                ));
            }
        }

        if self.recovery.max_retries == 0 {
            return Err(invalid("recovery.max_retries", "must be at least 1"));
        }
        if self.recovery.lobby_poll_ms == 0 {
            return Err(invalid("recovery.lobby_poll_ms", "must be greater than 0"));
        }
        if self.recovery.overlay_grace_secs >= self.recovery.lobby_timeout_secs {
            return Err(invalid(
                "recovery.overlay_grace_secs",
                format!(
                    "{} must be less than recovery.lobby_timeout_secs ({})",
                    self.recovery.overlay_grace_secs, self.recovery.lobby_timeout_secs
                ),
            ));
        }

        let polls = [
            ("timing.click_poll_ms", self.timing.click_poll_ms),
            ("timing.wait_poll_ms", self.timing.wait_poll_ms),
            ("timing.outcome_poll_secs", self.timing.outcome_poll_secs),
            ("timing.pause_poll_ms", self.timing.pause_poll_ms),
        ];
        for (key, value) in polls {
            if value == 0 {
                return Err(invalid(key, "must be greater than 0"));
            }
        }
        if self.timing.battle_timeout_secs == 0 {
            return Err(invalid("timing.battle_timeout_secs", "must be greater than 0"));
        }

        if self.device.adb_path.trim().is_empty() {
            return Err(invalid("device.adb_path", "must not be empty"));
        }
        if self.device.command_timeout_secs == 0 || self.device.capture_timeout_secs == 0 {
            return Err(invalid("device", "command and capture timeouts must be greater than 0"));
        }

        if self.emulator.kind.is_managed() && self.emulator.manager_path.is_none() {
            return Err(ConfigError::MissingRequired(format!(
                "emulator.manager_path (required when emulator.kind = \"{}\")",
                self.emulator.kind
            )));
        }
        if self.emulator.boot_poll_interval_secs == 0 {
            return Err(invalid("emulator.boot_poll_interval_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorKind;

    fn key_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { key, .. } => key,
            ConfigError::MissingRequired(key) => key,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_empty_difficulties() {
        let mut config = Config::default();
        config.campaign.difficulties.clear();
        assert_eq!(key_of(config.validate().unwrap_err()), "campaign.difficulties");
    }

    #[test]
    fn test_rejects_zero_stages() {
        let mut config = Config::default();
        config.campaign.total_stages = 0;
        assert_eq!(key_of(config.validate().unwrap_err()), "campaign.total_stages");
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        for bad in [0.0, -0.1, 1.5] {
            let mut config = Config::default();
            config.vision.confidence = bad;
            assert_eq!(key_of(config.validate().unwrap_err()), "vision.confidence");
        }
        let mut config = Config::default();
        config.vision.confidence = 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_stage_template_without_placeholder() {
        let mut config = Config::default();
        config.campaign.stage_template = "A.png".to_string();
        assert_eq!(key_of(config.validate().unwrap_err()), "campaign.stage_template");
    }

    #[test]
    fn test_rejects_zero_max_retries() {
        let mut config = Config::default();
        config.recovery.max_retries = 0;
        assert_eq!(key_of(config.validate().unwrap_err()), "recovery.max_retries");
    }

    #[test]
    fn test_rejects_grace_not_below_lobby_timeout() {
        let mut config = Config::default();
        config.recovery.overlay_grace_secs = config.recovery.lobby_timeout_secs;
        assert_eq!(key_of(config.validate().unwrap_err()), "recovery.overlay_grace_secs");
    }

    #[test]
    fn test_managed_emulator_requires_manager_path() {
        let mut config = Config::default();
        config.emulator.kind = EmulatorKind::LdPlayer;
        assert!(key_of(config.validate().unwrap_err()).starts_with("emulator.manager_path"));
        config.emulator.manager_path = Some("C:/LDPlayer/ldconsole.exe".into());
        config.validate().unwrap();
    }
}
