use autosolo_utils::error::ConfigError;
use autosolo_utils::paths::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

use super::{CliArgs, Config, ConfigSource};

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults.
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is given in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        let start_dir = Utf8PathBuf::try_from(cwd).map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("current directory is not UTF-8: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Utf8Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        let mut config = match &config_path {
            Some(path) => Self::load_config_file(path)?,
            None => Config::default(),
        };

        if let Some(path) = &config_path {
            config.base_dir = Some(project_dir_for(path));
            config.config_path = Some(path.clone());
        }

        apply_cli_overrides(&mut config, cli_args);

        config.validate()?;
        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.autosolo/config.toml`, stopping
    /// at repository root markers (.git, .hg, .svn) or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if [".git", ".hg", ".svn"].iter().any(|marker| dir.join(marker).exists()) {
                break;
            }
            current = dir.parent();
        }

        None
    }

    /// Parse a config file, recording every key it sets as `ConfigSource::Config`.
    pub fn load_config_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_string(),
                }
            } else {
                ConfigError::InvalidFile(format!("{path}: {e}"))
            }
        })?;

        let table: toml::Table = content
            .parse()
            .map_err(|e| ConfigError::InvalidFile(format!("{path}: {e}")))?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidFile(format!("{path}: {e}")))?;

        config.source_attribution = attribution_for(&table);
        Ok(config)
    }
}

/// The directory holding `.autosolo/`, or the file's own directory for
/// configs that live elsewhere.
fn project_dir_for(config_path: &Utf8Path) -> Utf8PathBuf {
    let parent = config_path.parent().unwrap_or(Utf8Path::new("."));
    if parent.file_name() == Some(CONFIG_DIR_NAME) {
        parent.parent().unwrap_or(Utf8Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

fn attribution_for(table: &toml::Table) -> HashMap<String, ConfigSource> {
    let mut attribution = HashMap::new();
    for (section, value) in table {
        match value {
            toml::Value::Table(keys) => {
                for key in keys.keys() {
                    attribution.insert(format!("{section}.{key}"), ConfigSource::Config);
                }
            }
            _ => {
                attribution.insert(section.clone(), ConfigSource::Config);
            }
        }
    }
    attribution
}

fn apply_cli_overrides(config: &mut Config, cli: &CliArgs) {
    let mut set = |key: &str| {
        config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Cli);
    };

    if cli.adb_path.is_some() {
        set("device.adb_path");
    }
    if cli.serial.is_some() {
        set("device.serial");
    }
    if cli.package.is_some() {
        set("device.package");
    }
    if cli.assets_dir.is_some() {
        set("vision.assets_dir");
    }
    if cli.confidence.is_some() {
        set("vision.confidence");
    }
    if cli.state_file.is_some() {
        set("campaign.state_file");
    }
    if cli.max_retries.is_some() {
        set("recovery.max_retries");
    }
    if cli.emulator_index.is_some() {
        set("emulator.index");
    }

    if let Some(adb_path) = &cli.adb_path {
        config.device.adb_path = adb_path.clone();
    }
    if let Some(serial) = &cli.serial {
        config.device.serial = Some(serial.clone());
    }
    if let Some(package) = &cli.package {
        config.device.package = Some(package.clone());
    }
    // CLI paths are relative to the working directory, not the project
    if let Some(assets_dir) = &cli.assets_dir {
        config.vision.assets_dir = absolutize(assets_dir);
    }
    if let Some(state_file) = &cli.state_file {
        config.campaign.state_file = Some(absolutize(state_file));
    }
    if let Some(confidence) = cli.confidence {
        config.vision.confidence = confidence;
    }
    if let Some(max_retries) = cli.max_retries {
        config.recovery.max_retries = max_retries;
    }
    if let Some(index) = cli.emulator_index {
        config.emulator.index = index;
    }
}

fn absolutize(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .ok()
        .and_then(|cwd| Utf8PathBuf::try_from(cwd).ok())
        .map_or_else(|| path.to_path_buf(), |cwd| cwd.join(path))
}
