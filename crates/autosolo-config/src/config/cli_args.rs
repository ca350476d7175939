use camino::Utf8PathBuf;

/// CLI overrides applied on top of the config file.
///
/// Every field is optional; `None` leaves the file or default value alone.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; skips upward discovery
    pub config_path: Option<Utf8PathBuf>,
    pub adb_path: Option<String>,
    pub serial: Option<String>,
    pub package: Option<String>,
    pub assets_dir: Option<Utf8PathBuf>,
    pub state_file: Option<Utf8PathBuf>,
    pub confidence: Option<f32>,
    pub max_retries: Option<u32>,
    pub emulator_index: Option<u32>,
}
