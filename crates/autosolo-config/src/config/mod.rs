mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use model::{
    CampaignConfig, Config, CrashConfig, CriticalEventConfig, DeviceConfig, EmulatorConfig,
    EmulatorKind, RecoveryConfig, TemplateSpec, TemplatesConfig, TimingConfig, VisionConfig,
};
pub use sources::ConfigSource;
