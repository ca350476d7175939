//! Command implementations
//!
//! Each command returns `anyhow::Result`; library failures travel as
//! [`AutosoloError`] so `run()` can map them to exit codes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use autosolo_device::{AdbDevice, DeviceControl, ImageSearch, TemplateMatcher};
use autosolo_engine::templates::CampaignTemplates;
use autosolo_error_reporter::{CrashReporter, EvidenceReporter, NoopReporter};
use autosolo_runner::NativeRunner;
use autosolo_utils::error::ConfigError;

use crate::doctor::{DoctorCommand, print_doctor_report};
use crate::operator::OperatorListeners;
use crate::{
    AutosoloError, Campaign, CampaignSummary, CheckpointStore, Config, ExitCode, LockInfo,
    Offset, Point, RunLock, RunState, SystemClock,
};

/// Score below which `locate` warns that the match is probably wrong.
pub const LOCATE_CONFIDENCE: f32 = 0.8;

/// A command already printed its outcome and only needs a specific exit code.
#[derive(Debug, thiserror::Error)]
#[error("command finished with exit code {}", .0.as_i32())]
pub struct ExitWith(pub ExitCode);

fn adb_device(config: &Config) -> Arc<AdbDevice> {
    Arc::new(AdbDevice::from_config(config, Arc::new(NativeRunner::new())))
}

// ============================================================================
// run
// ============================================================================

pub async fn execute_run_command(config: &Config, force_lock: bool) -> Result<()> {
    let adb = adb_device(config);
    let lock = RunLock::acquire(&config.state_dir(), config.device.serial.as_deref(), force_lock)
        .map_err(AutosoloError::from)?;
    info!(lock = %lock.path(), device = adb.serial_label(), "Run lock acquired");

    // Missing templates fail here, before the first tap.
    let matcher = TemplateMatcher::new(config.assets_dir());
    let names = CampaignTemplates::from_config(config).names();
    matcher
        .library()
        .preload(names.iter().map(String::as_str))
        .map_err(AutosoloError::from)?;
    info!(count = names.len(), assets = %config.assets_dir(), "Templates loaded");

    let device: Arc<dyn DeviceControl> = adb;
    let reporter: Arc<dyn CrashReporter> = if config.crash.enabled {
        Arc::new(EvidenceReporter::new(
            Arc::clone(&device),
            config.crash_dir(),
            config.crash.record_secs,
        ))
    } else {
        Arc::new(NoopReporter)
    };

    let run_state = Arc::new(RunState::with_granularity(Duration::from_millis(
        config.timing.pause_poll_ms,
    )));
    let listeners = OperatorListeners::spawn(Arc::clone(&run_state));

    let campaign = Campaign::from_config(
        config,
        device,
        Arc::new(matcher),
        run_state,
        Arc::new(SystemClock::new()),
        reporter,
    );
    let outcome = tokio::task::spawn_blocking(move || campaign.run()).await;

    listeners.shutdown();
    if let Err(e) = lock.release() {
        warn!(error = %e, "Failed to release run lock");
    }

    let summary = outcome
        .context("Campaign thread panicked")?
        .map_err(AutosoloError::from)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &CampaignSummary) {
    println!("✓ Campaign complete");
    println!("  Resumed from:     {}", summary.resumed_from);
    println!("  Stages completed: {}", summary.stages_completed);
    println!("  Battles won:      {}", summary.battles);
    if summary.stage_failures > 0 {
        println!(
            "  Stage failures:   {} ({} recoveries)",
            summary.stage_failures, summary.recoveries
        );
    }
}

// ============================================================================
// status / reset
// ============================================================================

#[derive(Debug, Serialize)]
struct StatusOutput {
    state_file: String,
    exists: bool,
    tier_index: u32,
    stage_index: u32,
    difficulty: Option<String>,
    tier_count: usize,
    total_stages: u32,
    complete: bool,
    lock: Option<LockInfo>,
}

pub fn execute_status_command(config: &Config, json: bool) -> Result<()> {
    let store = CheckpointStore::new(config.state_file());
    let progress = store.load();
    let templates = CampaignTemplates::from_config(config);
    let lock = RunLock::inspect(&config.state_dir()).map_err(AutosoloError::from)?;

    let output = StatusOutput {
        state_file: store.path().to_string(),
        exists: store.exists(),
        tier_index: progress.tier_index,
        stage_index: progress.stage_index,
        difficulty: templates
            .difficulty_name(progress.tier_index as usize)
            .map(str::to_string),
        tier_count: templates.tier_count(),
        total_stages: templates.total_stages(),
        complete: progress.tier_index as usize >= templates.tier_count(),
        lock,
    };

    if json {
        let rendered =
            serde_json::to_string_pretty(&output).context("Failed to serialize status")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Checkpoint: {}", output.state_file);
    if !output.exists {
        println!("  No checkpoint yet; the next run starts at the first tier");
    }
    if output.complete {
        println!(
            "  Every tier is done (tier index {}); 'autosolo reset' starts over",
            output.tier_index
        );
    } else {
        println!(
            "  Tier:  {} of {} ({})",
            output.tier_index + 1,
            output.tier_count,
            output.difficulty.as_deref().unwrap_or("?")
        );
        println!(
            "  Stage: {} of {} (the next run starts here)",
            progress.resume_stage(),
            output.total_stages
        );
    }
    match &output.lock {
        Some(info) => println!(
            "  Run lock: held by PID {} since {}",
            info.pid,
            info.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  Run lock: free"),
    }
    Ok(())
}

pub fn execute_reset_command(config: &Config, tier: u32, stage: u32) -> Result<()> {
    let templates = CampaignTemplates::from_config(config);
    let Some(difficulty) = templates.difficulty_name(tier as usize) else {
        return Err(AutosoloError::from(ConfigError::InvalidValue {
            key: "tier".to_string(),
            value: format!(
                "{tier} is out of range (0..{} for this campaign)",
                templates.tier_count()
            ),
        })
        .into());
    };
    if stage == 0 || stage > templates.total_stages() {
        return Err(AutosoloError::from(ConfigError::InvalidValue {
            key: "stage".to_string(),
            value: format!("{stage} is out of range (1..={})", templates.total_stages()),
        })
        .into());
    }
    let difficulty = difficulty.to_string();

    // Refuse to rewrite the checkpoint under a running campaign.
    let lock = RunLock::acquire(&config.state_dir(), None, false).map_err(AutosoloError::from)?;
    let store = CheckpointStore::new(config.state_file());
    let saved = store.save(tier, stage).map_err(AutosoloError::from);
    if let Err(e) = lock.release() {
        warn!(error = %e, "Failed to release run lock");
    }
    saved?;

    println!("✓ Checkpoint reset to tier {tier} ({difficulty}), stage {stage}");
    println!("  {}", store.path());
    Ok(())
}

// ============================================================================
// locate
// ============================================================================

#[derive(Debug, Serialize)]
struct LocateOutput {
    template: String,
    screen_width: u32,
    screen_height: u32,
    center: Point,
    top_left: Point,
    width: u32,
    height: u32,
    score: f32,
    confident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<Offset>,
}

pub fn execute_locate_command(
    config: &Config,
    template: &str,
    target: Option<Point>,
    json: bool,
) -> Result<()> {
    let device = adb_device(config);
    let frame = device.capture_screen().map_err(AutosoloError::from)?;
    let matcher = TemplateMatcher::new(config.assets_dir());
    let best = matcher
        .best_match(&frame, template)
        .map_err(AutosoloError::from)?;

    let Some(found) = best else {
        eprintln!(
            "✗ '{template}' is larger than the {}x{} screen",
            frame.width(),
            frame.height()
        );
        return Err(ExitWith(ExitCode::CLI_ARGS).into());
    };

    let output = LocateOutput {
        template: template.to_string(),
        screen_width: frame.width(),
        screen_height: frame.height(),
        center: found.center,
        top_left: found.top_left,
        width: found.width,
        height: found.height,
        score: found.score,
        confident: found.score >= LOCATE_CONFIDENCE,
        target,
        offset: target.map(|t| found.center.offset_to(t)),
    };

    if !output.confident {
        eprintln!(
            "⚠ Best score {:.3} is below {LOCATE_CONFIDENCE}; this is probably not the right place",
            output.score
        );
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&output).context("Failed to serialize locate output")?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "{}: center {} score {:.3} ({}x{} at {})",
        output.template, output.center, output.score, output.width, output.height, output.top_left
    );
    if let (Some(target), Some(offset)) = (output.target, output.offset) {
        println!("  Offset to {target}: {offset}");
        println!(
            "  [templates] entry: {{ file = \"{}\", offset = {{ dx = {}, dy = {} }} }}",
            output.template, offset.dx, offset.dy
        );
    }
    Ok(())
}

// ============================================================================
// doctor / config
// ============================================================================

pub fn execute_doctor_command(config: &Config, json: bool) -> Result<()> {
    let device: Arc<dyn DeviceControl> = adb_device(config);
    let output = DoctorCommand::new(config, device).run();

    if json {
        let rendered =
            serde_json::to_string_pretty(&output).context("Failed to serialize doctor output")?;
        println!("{rendered}");
    } else {
        print_doctor_report(&output);
        if !output.ok {
            println!();
            println!("Some checks failed. Please address the issues above before 'autosolo run'.");
        }
    }

    if !output.ok {
        return Err(ExitWith(ExitCode::INTERNAL).into());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    value: String,
    source: String,
}

pub fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let entries: BTreeMap<_, _> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigEntry { value, source }))
            .collect();
        let rendered =
            serde_json::to_string_pretty(&entries).context("Failed to serialize configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    match &config.config_path {
        Some(path) => println!("Config file: {path}"),
        None => println!("Config file: none (defaults and CLI flags only)"),
    }
    println!("State file:  {}", config.state_file());
    println!("Crash dir:   {}", config.crash_dir());
    println!();

    let width = effective.keys().map(String::len).max().unwrap_or(0);
    for (key, (value, source)) in &effective {
        println!("  {key:<width$} = {value}  [{source}]");
    }
    Ok(())
}
