use camino::Utf8PathBuf;

use autosolo_utils::error::ConfigError;

use super::{Config, ConfigSource, EmulatorKind};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// ```rust,no_run
    /// use autosolo_config::Config;
    ///
    /// let config = Config::builder()
    ///     .serial("127.0.0.1:5555")
    ///     .difficulties(["normal.png", "hard.png"])
    ///     .total_stages(8)
    ///     .build()
    ///     .expect("valid config");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent construction of a `Config` without touching the filesystem.
///
/// Values set here are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config, e.g. one loaded from a file.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    fn mark(&mut self, key: &str) {
        self.config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Programmatic);
    }

    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.config.device.serial = Some(serial.into());
        self.mark("device.serial");
        self
    }

    #[must_use]
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.config.device.package = Some(package.into());
        self.mark("device.package");
        self
    }

    #[must_use]
    pub fn assets_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.vision.assets_dir = dir.into();
        self.mark("vision.assets_dir");
        self
    }

    #[must_use]
    pub fn state_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.config.campaign.state_file = Some(path.into());
        self.mark("campaign.state_file");
        self
    }

    /// Difficulty markers, one per tier, in order.
    #[must_use]
    pub fn difficulties<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.campaign.difficulties = markers.into_iter().map(Into::into).collect();
        self.mark("campaign.difficulties");
        self
    }

    #[must_use]
    pub fn total_stages(mut self, stages: u32) -> Self {
        self.config.campaign.total_stages = stages;
        self.mark("campaign.total_stages");
        self
    }

    #[must_use]
    pub fn confidence(mut self, confidence: f32) -> Self {
        self.config.vision.confidence = confidence;
        self.mark("vision.confidence");
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.recovery.max_retries = retries;
        self.mark("recovery.max_retries");
        self
    }

    /// Consecutive failures of one stage before the run aborts; 0 = unbounded.
    #[must_use]
    pub fn stage_retry_limit(mut self, limit: u32) -> Self {
        self.config.recovery.stage_retry_limit = limit;
        self.mark("recovery.stage_retry_limit");
        self
    }

    #[must_use]
    pub fn emulator(mut self, kind: EmulatorKind, manager_path: impl Into<Utf8PathBuf>) -> Self {
        self.config.emulator.kind = kind;
        self.config.emulator.manager_path = Some(manager_path.into());
        self.mark("emulator.kind");
        self.mark("emulator.manager_path");
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_are_valid() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.recovery.max_retries, 5);
        assert!(config.source_attribution.is_empty());
    }

    #[test]
    fn test_builder_sets_programmatic_attribution() {
        let config = Config::builder()
            .serial("127.0.0.1:5555")
            .difficulties(["a.png", "b.png"])
            .total_stages(4)
            .stage_retry_limit(0)
            .build()
            .unwrap();

        assert_eq!(config.device.serial.as_deref(), Some("127.0.0.1:5555"));
        assert_eq!(config.campaign.difficulties, vec!["a.png", "b.png"]);
        assert_eq!(config.recovery.stage_retry_limit, 0);
        assert_eq!(
            config.source_attribution.get("campaign.total_stages"),
            Some(&ConfigSource::Programmatic)
        );
        let effective = config.effective_config();
        assert_eq!(effective.get("device.serial").unwrap().1, "programmatic");
    }

    #[test]
    fn test_builder_validates() {
        assert!(Config::builder().total_stages(0).build().is_err());
        assert!(Config::builder().confidence(2.0).build().is_err());
    }

    #[test]
    fn test_builder_emulator() {
        let config = Config::builder()
            .emulator(EmulatorKind::MuMu, "C:/MuMu/MuMuManager.exe")
            .build()
            .unwrap();
        assert_eq!(config.emulator.kind, EmulatorKind::MuMu);
        assert_eq!(config.emulator_process_names().len(), 3);
    }
}
