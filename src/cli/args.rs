//! CLI argument definitions

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::{CliArgs, Point};

/// autosolo - checkpointed campaign runner for touchscreen apps
#[derive(Parser, Debug)]
#[command(name = "autosolo")]
#[command(about = "Drive a touchscreen app through a tiers x stages campaign over ADB")]
#[command(long_about = r#"
autosolo captures the device screen, matches reference images, and taps its way
through every stage of every difficulty tier. Progress is saved after each
confirmed stage; a crash or freeze triggers an escalating recovery (app restart,
then emulator reboot) and the failed stage is retried.

EXAMPLES:
  # Verify adb, the device connection, screen capture and templates
  autosolo doctor

  # Run or resume the campaign
  autosolo run --serial 127.0.0.1:5555 --package com.example.game

  # Show the saved checkpoint
  autosolo status

  # Start over from the second tier
  autosolo reset --tier 1

  # Find a template on the current screen and the tap offset to a point
  autosolo locate settle_confirm.png --target 640,620

OPERATOR CONTROL (during `run`):
  Ctrl-C          stop after the current check point
  p / pause       toggle pause (type the word and press Enter)
  q / stop        stop
  SIGUSR1         toggle pause (Unix)

CONFIGURATION:
  Precedence is CLI flags > config file > defaults.
  The config file is discovered by searching upward from CWD for .autosolo/config.toml.
  State (checkpoint, crash reports, run lock) lives under AUTOSOLO_HOME, default ./.autosolo
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// adb executable
    #[arg(long, global = true)]
    pub adb_path: Option<String>,

    /// Device serial passed to `adb -s`
    #[arg(long, global = true)]
    pub serial: Option<String>,

    /// Android package restarted during recovery
    #[arg(long, global = true)]
    pub package: Option<String>,

    /// Directory holding the template images
    #[arg(long, global = true)]
    pub assets_dir: Option<Utf8PathBuf>,

    /// Checkpoint file
    #[arg(long, global = true)]
    pub state_file: Option<Utf8PathBuf>,

    /// Default match confidence in (0, 1]
    #[arg(long, global = true)]
    pub confidence: Option<f32>,

    /// Recovery attempts before giving up (the last one reboots the emulator)
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Emulator instance index for the manager console
    #[arg(long, global = true)]
    pub emulator_index: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit log lines as JSON objects
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Overrides handed to config discovery.
    #[must_use]
    pub fn to_cli_args(&self) -> CliArgs {
        CliArgs {
            config_path: self.config.clone(),
            adb_path: self.adb_path.clone(),
            serial: self.serial.clone(),
            package: self.package.clone(),
            assets_dir: self.assets_dir.clone(),
            state_file: self.state_file.clone(),
            confidence: self.confidence,
            max_retries: self.max_retries,
            emulator_index: self.emulator_index,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the campaign from the saved checkpoint to the end of the last tier
    Run {
        /// Take the run lock even if a live process holds it
        #[arg(long)]
        force_lock: bool,
    },

    /// Show the saved checkpoint
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Overwrite the checkpoint
    Reset {
        /// Tier index (0-based)
        #[arg(long, default_value_t = 0)]
        tier: u32,

        /// Stage number (1-based)
        #[arg(long, default_value_t = 1)]
        stage: u32,
    },

    /// Capture the screen once and report where a template matches best
    Locate {
        /// Template file name inside the assets directory
        template: String,

        /// Point to compute the tap offset to, as X,Y
        #[arg(long, value_parser = parse_point)]
        target: Option<Point>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check adb, the device connection, screen capture and template assets
    Doctor {
        /// Output doctor results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration and where each value came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Operation name used in error reports.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Status { .. } => "status",
            Commands::Reset { .. } => "reset",
            Commands::Locate { .. } => "locate",
            Commands::Doctor { .. } => "doctor",
            Commands::Config { .. } => "config",
        }
    }
}

/// Parse `X,Y` into a screen point.
pub fn parse_point(value: &str) -> Result<Point, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{value}'"))?;
    let x = x
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid X '{x}': {e}"))?;
    let y = y
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid Y '{y}': {e}"))?;
    Ok(Point::new(x, y))
}
