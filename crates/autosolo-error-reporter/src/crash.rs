use autosolo_device::DeviceControl;
use autosolo_utils::error::CampaignError;
use autosolo_utils::paths::ensure_dir_all;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use std::error::Error as _;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Invoked with a stage failure before recovery runs.
///
/// Fire-and-forget: implementations log their own problems and never fail.
pub trait CrashReporter: Send + Sync {
    fn report(&self, error: &CampaignError, context: &str);
}

/// Discards every report. Used when `[crash] enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl CrashReporter for NoopReporter {
    fn report(&self, _error: &CampaignError, _context: &str) {}
}

/// Files written for one failure. Missing entries failed or were disabled.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvidenceFiles {
    pub screenshot: Option<Utf8PathBuf>,
    pub log: Option<Utf8PathBuf>,
    pub recording: Option<Utf8PathBuf>,
}

/// Screenshot, text log and screen recording of the device at failure time,
/// named `<YYYYmmdd_HHMMSS>_<label>.{png,txt,mp4}`.
pub struct EvidenceReporter {
    device: Arc<dyn DeviceControl>,
    dir: Utf8PathBuf,
    record: Option<Duration>,
}

impl EvidenceReporter {
    /// `record_secs = 0` disables the screen recording.
    #[must_use]
    pub fn new(device: Arc<dyn DeviceControl>, dir: impl Into<Utf8PathBuf>, record_secs: u64) -> Self {
        Self {
            device,
            dir: dir.into(),
            record: (record_secs > 0).then(|| Duration::from_secs(record_secs)),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Write all evidence for `error`. Each step is independent.
    pub fn capture(&self, error: &CampaignError, context: &str) -> EvidenceFiles {
        let mut files = EvidenceFiles::default();
        if let Err(e) = ensure_dir_all(&self.dir) {
            warn!(dir = %self.dir, error = %e, "Cannot create crash report directory");
            return files;
        }

        let stem = format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), sanitize(context));

        let png = self.dir.join(format!("{stem}.png"));
        match self.device.capture_screen().and_then(|frame| frame.save_png(&png)) {
            Ok(()) => files.screenshot = Some(png),
            Err(e) => warn!(error = %e, "Crash screenshot failed"),
        }

        let txt = self.dir.join(format!("{stem}.txt"));
        match std::fs::write(&txt, render_log(error, context)) {
            Ok(()) => files.log = Some(txt),
            Err(e) => warn!(path = %txt, error = %e, "Crash log write failed"),
        }

        if let Some(duration) = self.record {
            files.recording = self.record(&stem, duration);
        }

        info!(
            context,
            screenshot = files.screenshot.is_some(),
            log = files.log.is_some(),
            recording = files.recording.is_some(),
            "Crash evidence saved to {}",
            self.dir
        );
        files
    }

    fn record(&self, stem: &str, duration: Duration) -> Option<Utf8PathBuf> {
        let remote = format!("/sdcard/autosolo_{stem}.mp4");
        let local = self.dir.join(format!("{stem}.mp4"));

        info!(secs = duration.as_secs(), "Recording device screen");
        if let Err(e) = self.device.record_screen(&remote, duration) {
            warn!(error = %e, "Screen recording failed");
            return None;
        }
        let pulled = self.device.pull_file(&remote, &local);
        if let Err(e) = self.device.run_shell(&format!("rm {remote}")) {
            warn!(remote, error = %e, "Could not delete recording on device");
        }
        match pulled {
            Ok(()) => Some(local),
            Err(e) => {
                warn!(error = %e, "Could not pull screen recording");
                None
            }
        }
    }
}

impl CrashReporter for EvidenceReporter {
    fn report(&self, error: &CampaignError, context: &str) {
        let _ = self.capture(error, context);
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn render_log(error: &CampaignError, context: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "time:    {}", Local::now().to_rfc3339());
    let _ = writeln!(out, "context: {context}");
    let _ = writeln!(out, "error:   {error}");
    let _ = writeln!(out, "debug:   {error:?}");

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = writeln!(out, "caused by: {cause}");
        source = cause.source();
    }
    out
}
