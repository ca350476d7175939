//! End-to-end campaign runs through the public facade against a scripted
//! device on virtual time.

use std::sync::Arc;

use autosolo::{AutosoloError, Campaign, CampaignProgress, CheckpointStore, Config, ExitCode, RunState};
use autosolo_engine::clock::ManualClock;
use autosolo_engine::testing::{Event, FakeDevice, RecordingReporter, Tap, points, script_campaign};
use autosolo_utils::test_support::utf8_tempdir;
use camino::Utf8Path;

fn two_by_three(state_dir: &Utf8Path) -> Config {
    Config::builder()
        .difficulties(["diff_1.png", "diff_2.png"])
        .total_stages(3)
        .state_file(state_dir.join("state.json"))
        .build()
        .expect("valid config")
}

struct World {
    device: Arc<FakeDevice>,
    reporter: Arc<RecordingReporter>,
    campaign: Campaign,
}

fn world(device: FakeDevice, config: &Config, run_state: Arc<RunState>) -> World {
    let clock = Arc::new(ManualClock::new());
    device.attach_clock(clock.clone());
    let device = Arc::new(device);
    let reporter = Arc::new(RecordingReporter::new());
    let campaign = Campaign::from_config(
        config,
        device.clone(),
        device.clone(),
        run_state,
        clock,
        reporter.clone(),
    );
    World {
        device,
        reporter,
        campaign,
    }
}

fn stage_taps(device: &FakeDevice) -> Vec<u32> {
    device
        .taps()
        .into_iter()
        .filter_map(|tap| match tap {
            Tap::At(at) => (1..=3).find(|n| points::stage(*n) == at),
            Tap::Swipe(_) => None,
        })
        .collect()
}

#[test]
fn resume_from_last_tier_finishes_remaining_stages() {
    let (_td, dir) = utf8_tempdir();
    let config = two_by_three(&dir);
    CheckpointStore::new(config.state_file()).save(1, 2).unwrap();

    let device = FakeDevice::new();
    script_campaign(&device, &config);
    let w = world(device, &config, Arc::new(RunState::new()));

    let summary = w.campaign.run().unwrap();

    assert_eq!(summary.resumed_from, CampaignProgress::new(1, 2));
    assert_eq!(summary.stages_completed, 2);
    assert_eq!(stage_taps(&w.device), vec![2, 3]);
    assert!(!w.device.taps().contains(&Tap::At(points::difficulty(0))));
    // No boundary write after the last tier
    assert_eq!(
        CheckpointStore::new(config.state_file()).load(),
        CampaignProgress::new(1, 3)
    );
    assert!(w.reporter.contexts().is_empty());
}

#[test]
fn fresh_run_walks_both_tiers() {
    let (_td, dir) = utf8_tempdir();
    let config = two_by_three(&dir);

    let device = FakeDevice::new();
    script_campaign(&device, &config);
    let w = world(device, &config, Arc::new(RunState::new()));

    let summary = w.campaign.run().unwrap();

    assert_eq!(summary.resumed_from, CampaignProgress::default());
    assert_eq!(summary.stages_completed, 6);
    assert_eq!(stage_taps(&w.device), vec![1, 2, 3, 1, 2, 3]);
    assert_eq!(
        CheckpointStore::new(config.state_file()).load(),
        CampaignProgress::new(1, 3)
    );
}

#[test]
fn stop_during_stage_maps_to_stopped_exit() {
    let (_td, dir) = utf8_tempdir();
    let config = two_by_three(&dir);
    let run_state = Arc::new(RunState::new());

    let device = FakeDevice::new();
    script_campaign(&device, &config);
    let stopper = run_state.clone();
    device.on_tap("A2.png", move |_screen| stopper.signal_stop());
    let w = world(device, &config, run_state);

    let err = AutosoloError::from(w.campaign.run().unwrap_err());

    assert_eq!(err.to_exit_code(), ExitCode::STOPPED);
    assert_eq!(
        CheckpointStore::new(config.state_file()).load(),
        CampaignProgress::new(0, 1)
    );
}

#[test]
fn unreachable_stage_exhausts_retries() {
    let (_td, dir) = utf8_tempdir();
    let config = Config::builder()
        .difficulties(["diff_1.png"])
        .total_stages(3)
        .stage_retry_limit(3)
        .state_file(dir.join("state.json"))
        .build()
        .unwrap();

    let device = FakeDevice::new();
    script_campaign(&device, &config);
    device.hide("A3.png");
    let w = world(device, &config, Arc::new(RunState::new()));

    let err = AutosoloError::from(w.campaign.run().unwrap_err());

    assert_eq!(err.to_exit_code(), ExitCode::STAGE_RETRIES_EXHAUSTED);
    assert_eq!(w.reporter.contexts(), vec!["Diff_0_Level_3"; 3]);
    let restarts = w
        .device
        .events()
        .iter()
        .filter(|e| **e == Event::StartApp)
        .count();
    // The third failure hits the cap before recovering again
    assert_eq!(restarts, 2);
    assert_eq!(
        CheckpointStore::new(config.state_file()).load(),
        CampaignProgress::new(0, 2)
    );
}
