//! Configuration for autosolo: defaults, `.autosolo/config.toml`, CLI overrides.
//!
//! Precedence is CLI > config file > built-in defaults. Every value that did
//! not come from the defaults is recorded in `Config::source_attribution`
//! under its dotted key (e.g. `device.serial`).

pub mod config;

pub use config::{
    CampaignConfig, CliArgs, Config, ConfigBuilder, ConfigSource, CrashConfig,
    CriticalEventConfig, DeviceConfig, EmulatorConfig, EmulatorKind, RecoveryConfig,
    TemplateSpec, TemplatesConfig, TimingConfig, VisionConfig,
};
