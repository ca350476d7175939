//! autosolo - checkpointed campaign runner for touchscreen apps on ADB devices
//!
//! autosolo walks a tiers x stages campaign in an Android app: it captures the
//! screen, finds reference images, taps and swipes its way through each stage,
//! saves a checkpoint after every confirmed stage and recovers from crashes by
//! restarting the app or rebooting the emulator.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Check adb, the device and the template assets
//! autosolo doctor
//!
//! # Run (or resume) the campaign
//! autosolo run --serial 127.0.0.1:5555 --package com.example.game
//!
//! # Inspect or rewrite the checkpoint
//! autosolo status --json
//! autosolo reset --tier 1 --stage 1
//! ```
//!
//! # Library
//!
//! The campaign engine is usable on its own: build a [`Config`], wire a
//! [`DeviceControl`] and an [`ImageSearch`] into [`Campaign::from_config`] and
//! call [`Campaign::run`]. The engine crate's `test-utils` feature provides a
//! scripted device and a virtual clock for exercising it without hardware.

pub mod cli;
pub mod doctor;
pub mod operator;

pub use autosolo_config::{CliArgs, Config, ConfigBuilder, ConfigSource, EmulatorKind};
pub use autosolo_device::{
    AdbDevice, DeviceControl, Frame, ImageSearch, Match, Template, TemplateMatcher,
};
pub use autosolo_engine::{
    Campaign, CampaignProgress, CampaignSummary, CheckpointStore, Clock, RunState, SystemClock,
};
pub use autosolo_error_reporter::{CrashReporter, EvidenceReporter, NoopReporter};
pub use autosolo_lock::{LockInfo, RunLock};
pub use autosolo_utils::error::{AutosoloError, CampaignError};
pub use autosolo_utils::exit_codes::ExitCode;
pub use autosolo_utils::types::{Offset, Point, Swipe};
