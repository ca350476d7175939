use autosolo_utils::paths;
use autosolo_utils::types::{Offset, Point, Swipe};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use strum::{Display, EnumString};

use super::ConfigSource;

/// Effective configuration. Constructed once at startup and passed down by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceConfig,
    pub emulator: EmulatorConfig,
    pub vision: VisionConfig,
    pub campaign: CampaignConfig,
    pub templates: TemplatesConfig,
    pub critical_events: Vec<CriticalEventConfig>,
    pub timing: TimingConfig,
    pub recovery: RecoveryConfig,
    pub crash: CrashConfig,

    /// Where each non-default value came from, keyed by dotted path
    #[serde(skip)]
    pub source_attribution: HashMap<String, ConfigSource>,

    /// Config file that was loaded, if any
    #[serde(skip)]
    pub config_path: Option<Utf8PathBuf>,

    /// Directory relative paths in the file are resolved against
    #[serde(skip)]
    pub base_dir: Option<Utf8PathBuf>,
}

impl Config {
    fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        match &self.base_dir {
            Some(base) => paths::resolve_against(base, path),
            None => path.to_path_buf(),
        }
    }

    /// Template image directory, resolved against the project directory.
    #[must_use]
    pub fn assets_dir(&self) -> Utf8PathBuf {
        self.resolve(&self.vision.assets_dir)
    }

    /// Checkpoint file location.
    #[must_use]
    pub fn state_file(&self) -> Utf8PathBuf {
        match &self.campaign.state_file {
            Some(path) => self.resolve(path),
            None => paths::default_checkpoint_path(),
        }
    }

    /// Directory guarded by the run lock: the checkpoint's parent.
    #[must_use]
    pub fn state_dir(&self) -> Utf8PathBuf {
        let state_file = self.state_file();
        match state_file.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        }
    }

    #[must_use]
    pub fn crash_dir(&self) -> Utf8PathBuf {
        match &self.crash.dir {
            Some(dir) => self.resolve(dir),
            None => paths::default_crash_dir(),
        }
    }

    /// Backend process names killed during a hard reboot.
    #[must_use]
    pub fn emulator_process_names(&self) -> Vec<String> {
        if self.emulator.process_names.is_empty() {
            self.emulator
                .kind
                .default_process_names()
                .iter()
                .map(|name| (*name).to_string())
                .collect()
        } else {
            self.emulator.process_names.clone()
        }
    }

    /// Threshold for `spec`, falling back to the global confidence.
    #[must_use]
    pub fn threshold_for(&self, spec: &TemplateSpec) -> f32 {
        spec.threshold.unwrap_or(self.vision.confidence)
    }

    /// Numbered stage template, e.g. `A7.png` for stage 7.
    #[must_use]
    pub fn stage_template_name(&self, stage: u32) -> String {
        self.campaign.stage_template.replace("{n}", &stage.to_string())
    }
}

// ============================================================================
// [device]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub adb_path: String,
    /// `adb -s` selector, e.g. `127.0.0.1:5555`. None uses adb's default device.
    pub serial: Option<String>,
    /// Android package restarted by recovery
    pub package: Option<String>,
    pub command_timeout_secs: u64,
    pub capture_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            serial: None,
            package: None,
            command_timeout_secs: 5,
            capture_timeout_secs: 10,
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

// ============================================================================
// [emulator]
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmulatorKind {
    /// Physical device or unmanaged emulator; hard reboot only reconnects
    #[default]
    None,
    #[serde(rename = "ldplayer")]
    #[strum(serialize = "ldplayer")]
    LdPlayer,
    #[serde(rename = "mumu")]
    #[strum(serialize = "mumu")]
    MuMu,
}

impl EmulatorKind {
    #[must_use]
    pub fn default_process_names(self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::LdPlayer => &[
                "dnplayer.exe",
                "Ld9BoxHeadless.exe",
                "LdVBoxHeadless.exe",
                "LdBoxHeadless.exe",
            ],
            Self::MuMu => &["MuMuPlayer.exe", "MuMuVMMHeadless.exe", "MuMuVMMSVC.exe"],
        }
    }

    #[must_use]
    pub fn is_managed(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    pub kind: EmulatorKind,
    /// `ldconsole.exe` / `MuMuManager.exe`
    pub manager_path: Option<Utf8PathBuf>,
    pub index: u32,
    /// Overrides the per-kind defaults when non-empty
    pub process_names: Vec<String>,
    pub shutdown_timeout_secs: u64,
    pub boot_timeout_secs: u64,
    pub boot_poll_interval_secs: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            kind: EmulatorKind::None,
            manager_path: None,
            index: 0,
            process_names: Vec::new(),
            shutdown_timeout_secs: 20,
            boot_timeout_secs: 180,
            boot_poll_interval_secs: 5,
        }
    }
}

// ============================================================================
// [vision]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisionConfig {
    pub assets_dir: Utf8PathBuf,
    /// Default match threshold for templates without their own
    pub confidence: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            assets_dir: Utf8PathBuf::from("assets"),
            confidence: 0.6,
        }
    }
}

// ============================================================================
// [campaign]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignConfig {
    /// Difficulty markers in tier order
    pub difficulties: Vec<String>,
    pub total_stages: u32,
    /// `{n}` is replaced by the stage number
    pub stage_template: String,
    /// Stages from this number on live in the secondary pack
    pub secondary_pack_from: u32,
    /// Threshold for the numbered stage templates
    pub stage_threshold: f32,
    pub state_file: Option<Utf8PathBuf>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            difficulties: (1..=4).map(|i| format!("diff_{i}.png")).collect(),
            total_stages: 13,
            stage_template: "A{n}.png".to_string(),
            secondary_pack_from: 12,
            stage_threshold: 0.8,
            state_file: None,
        }
    }
}

// ============================================================================
// [templates]
// ============================================================================

/// A template file plus optional threshold and tap offset.
///
/// Accepts either a bare file name or a table:
///
/// ```toml
/// win = "win.png"
/// auto_on = { file = "Auto_on.png", offset = { dx = -231, dy = -133 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSpec {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(skip_serializing_if = "offset_is_zero")]
    pub offset: Offset,
}

fn offset_is_zero(offset: &Offset) -> bool {
    offset.is_zero()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateSpecRepr {
    File(String),
    Full {
        file: String,
        #[serde(default)]
        threshold: Option<f32>,
        #[serde(default)]
        offset: Offset,
    },
}

impl<'de> Deserialize<'de> for TemplateSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match TemplateSpecRepr::deserialize(deserializer)? {
            TemplateSpecRepr::File(file) => TemplateSpec::file(file),
            TemplateSpecRepr::Full {
                file,
                threshold,
                offset,
            } => TemplateSpec {
                file,
                threshold,
                offset,
            },
        })
    }
}

impl TemplateSpec {
    #[must_use]
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            threshold: None,
            offset: Offset::ZERO,
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, dx: i32, dy: i32) -> Self {
        self.offset = Offset::new(dx, dy);
        self
    }
}

/// Every screen marker the campaign looks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// Stage-select screen button that opens the stage switcher
    pub stage_switch: TemplateSpec,
    pub primary_pack: TemplateSpec,
    pub secondary_pack: TemplateSpec,
    pub uncleared_mission: TemplateSpec,
    pub auto_off: TemplateSpec,
    pub auto_on: TemplateSpec,
    pub win: TemplateSpec,
    pub lose: TemplateSpec,
    pub draw: TemplateSpec,
    pub settle_confirm: TemplateSpec,
    pub settle_finish: TemplateSpec,
    /// Extra tap after settlement, matched loosely
    pub settle_dismiss: TemplateSpec,
    pub win_finish: TemplateSpec,
    pub back: TemplateSpec,
    pub lobby: TemplateSpec,
    pub lobby_confirm: TemplateSpec,
    /// Loading overlay (B1)
    pub overlay_loading: TemplateSpec,
    /// Notice overlay (B2)
    pub overlay_notice: TemplateSpec,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            stage_switch: TemplateSpec::file("change.png").with_threshold(0.4),
            primary_pack: TemplateSpec::file("A.png").with_threshold(0.8),
            secondary_pack: TemplateSpec::file("B.png").with_threshold(0.8),
            uncleared_mission: TemplateSpec::file("unclear.png"),
            auto_off: TemplateSpec::file("Auto_off.png").with_threshold(0.8),
            auto_on: TemplateSpec::file("Auto_on.png")
                .with_threshold(0.8)
                .with_offset(-231, -133),
            win: TemplateSpec::file("win.png").with_threshold(0.4),
            lose: TemplateSpec::file("lose.png"),
            draw: TemplateSpec::file("draw.png"),
            settle_confirm: TemplateSpec::file("fin_1.png"),
            settle_finish: TemplateSpec::file("fin_2.png").with_threshold(0.7),
            settle_dismiss: TemplateSpec::file("fin_2.png").with_threshold(0.4),
            win_finish: TemplateSpec::file("win_fin.png").with_threshold(0.8),
            back: TemplateSpec::file("back.png").with_threshold(0.8),
            lobby: TemplateSpec::file("lobby.png"),
            lobby_confirm: TemplateSpec::file("change.png"),
            overlay_loading: TemplateSpec::file("overlay_loading.png"),
            overlay_notice: TemplateSpec::file("overlay_notice.png"),
        }
    }
}

impl TemplatesConfig {
    /// All configured template files, for preloading and `doctor`.
    #[must_use]
    pub fn all(&self) -> Vec<&TemplateSpec> {
        vec![
            &self.stage_switch,
            &self.primary_pack,
            &self.secondary_pack,
            &self.uncleared_mission,
            &self.auto_off,
            &self.auto_on,
            &self.win,
            &self.lose,
            &self.draw,
            &self.settle_confirm,
            &self.settle_finish,
            &self.settle_dismiss,
            &self.win_finish,
            &self.back,
            &self.lobby,
            &self.lobby_confirm,
            &self.overlay_loading,
            &self.overlay_notice,
        ]
    }
}

/// An interrupt dialog and the button that dismisses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalEventConfig {
    pub trigger: String,
    pub action: String,
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// [timing]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub click_poll_ms: u64,
    pub click_timeout_secs: u64,
    /// Bounded wait for the stage switcher button
    pub switcher_timeout_secs: u64,
    pub switcher_settle_ms: u64,
    pub pack_settle_ms: u64,
    pub interlude_settle_ms: u64,
    /// After tapping an uncleared mission
    pub engage_settle_ms: u64,
    /// Between the two auto-play toggles
    pub auto_toggle_gap_ms: u64,
    pub win_tap_settle_ms: u64,
    pub wait_poll_ms: u64,
    pub wait_timeout_secs: u64,
    pub battle_timeout_secs: u64,
    pub outcome_poll_secs: u64,
    pub settle_max_taps: u32,
    pub settle_tap_interval_ms: u64,
    pub settle_press_ms: u64,
    pub stage_scroll_pages: u32,
    pub stage_scroll_settle_ms: u64,
    pub stage_probe_timeout_secs: u64,
    pub stage_swipe: Swipe,
    pub difficulty_scroll_pages: u32,
    pub difficulty_scroll_settle_ms: u64,
    pub difficulty_probe_timeout_secs: u64,
    pub difficulty_threshold: f32,
    pub mission_bottom_swipes: u32,
    pub mission_swipe: Swipe,
    pub mission_swipe_gap_ms: u64,
    pub mission_settle_ms: u64,
    pub between_missions_secs: u64,
    /// Before retrying a stage after recovery
    pub stage_retry_delay_secs: u64,
    pub pause_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            click_poll_ms: 1000,
            click_timeout_secs: 30,
            switcher_timeout_secs: 5,
            switcher_settle_ms: 2000,
            pack_settle_ms: 1000,
            interlude_settle_ms: 3000,
            engage_settle_ms: 5000,
            auto_toggle_gap_ms: 1000,
            win_tap_settle_ms: 1000,
            wait_poll_ms: 500,
            wait_timeout_secs: 30,
            battle_timeout_secs: 1200,
            outcome_poll_secs: 10,
            settle_max_taps: 30,
            settle_tap_interval_ms: 1000,
            settle_press_ms: 100,
            stage_scroll_pages: 7,
            stage_scroll_settle_ms: 3000,
            stage_probe_timeout_secs: 3,
            stage_swipe: Swipe::new(Point::new(500, 800), Point::new(500, 400), 500),
            difficulty_scroll_pages: 5,
            difficulty_scroll_settle_ms: 5000,
            difficulty_probe_timeout_secs: 5,
            difficulty_threshold: 0.8,
            mission_bottom_swipes: 5,
            mission_swipe: Swipe::new(Point::new(500, 900), Point::new(500, 200), 500),
            mission_swipe_gap_ms: 500,
            mission_settle_ms: 1500,
            between_missions_secs: 3,
            stage_retry_delay_secs: 3,
            pause_poll_ms: 200,
        }
    }
}

// ============================================================================
// [recovery]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    pub max_retries: u32,
    /// Wait after relaunching the app before looking for the lobby
    pub app_settle_secs: u64,
    pub retry_cooldown_secs: u64,
    /// Consecutive failures of one stage before giving up; 0 = never
    pub stage_retry_limit: u32,
    pub lobby_timeout_secs: u64,
    pub lobby_poll_ms: u64,
    pub lobby_confirm_taps: u32,
    /// How long a notice overlay may hide the loading overlay
    pub overlay_grace_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            app_settle_secs: 30,
            retry_cooldown_secs: 5,
            stage_retry_limit: 0,
            lobby_timeout_secs: 120,
            lobby_poll_ms: 1000,
            lobby_confirm_taps: 10,
            overlay_grace_secs: 10,
        }
    }
}

// ============================================================================
// [crash]
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrashConfig {
    pub enabled: bool,
    pub dir: Option<Utf8PathBuf>,
    /// Screen recording length; 0 disables recording
    pub record_secs: u64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            record_secs: 10,
        }
    }
}
