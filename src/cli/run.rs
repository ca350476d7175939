//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers the config, installs logging, builds the
//! tokio runtime and dispatches. It owns all error output.

use anyhow::Result;
use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;

use crate::{AutosoloError, CampaignError, Config, ExitCode};
use autosolo_error_reporter::utils as error_utils;
use autosolo_utils::logging::{LogFormat, init_tracing};

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` after printing the error report; main.rs only
/// exits with the code.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let cli_args = cli.to_cli_args();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(cli.verbose, format) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = AutosoloError::from(err);
            let contextual_report = error_utils::create_contextual_report(&err, "config");
            eprintln!("{contextual_report}");
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.operation();

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run { force_lock } => commands::execute_run_command(&config, force_lock).await,
            Commands::Status { json } => commands::execute_status_command(&config, json),
            Commands::Reset { tier, stage } => commands::execute_reset_command(&config, tier, stage),
            Commands::Locate {
                template,
                target,
                json,
            } => commands::execute_locate_command(&config, &template, target, json),
            Commands::Doctor { json } => commands::execute_doctor_command(&config, json),
            Commands::Config { json } => commands::execute_config_command(&config, json),
        }
    });

    // The stdin listener may still be parked on a read; don't wait for it.
    rt.shutdown_background();

    match result {
        Ok(()) => Ok(()),
        Err(e) => Err(report_error(&e, operation)),
    }
}

fn report_error(e: &anyhow::Error, operation: &str) -> ExitCode {
    if let Some(err) = e.downcast_ref::<AutosoloError>() {
        if matches!(err, AutosoloError::Campaign(CampaignError::EmergencyStop)) {
            eprintln!("Stopped by operator; progress is saved up to the last completed stage");
            return ExitCode::STOPPED;
        }
        let contextual_report = error_utils::create_contextual_report(err, operation);
        eprintln!("{contextual_report}");
        return err.to_exit_code();
    }
    if let Some(code) = e.downcast_ref::<commands::ExitWith>() {
        return code.0;
    }

    eprintln!("✗ Unexpected error: {e:#}");
    ExitCode::INTERNAL
}
