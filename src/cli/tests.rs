//! CLI tests: argument parsing and the offline commands.

use super::args::parse_point;
use super::commands::{self, ExitWith};
use super::*;
use crate::{AutosoloError, CheckpointStore, Config, ExitCode, Point, RunLock};
use autosolo_utils::paths::with_isolated_home;
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("autosolo").chain(args.iter().copied()))
        .expect("arguments should parse")
}

fn exit_code_of(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<AutosoloError>() {
        return e.to_exit_code();
    }
    err.downcast_ref::<ExitWith>()
        .map_or(ExitCode::INTERNAL, |e| e.0)
}

#[test]
fn test_global_flags_map_to_cli_args() {
    let cli = parse(&[
        "--serial",
        "127.0.0.1:5555",
        "--package",
        "com.example.game",
        "--confidence",
        "0.75",
        "--max-retries",
        "3",
        "--emulator-index",
        "2",
        "status",
    ]);
    let args = cli.to_cli_args();
    assert_eq!(args.serial.as_deref(), Some("127.0.0.1:5555"));
    assert_eq!(args.package.as_deref(), Some("com.example.game"));
    assert_eq!(args.confidence, Some(0.75));
    assert_eq!(args.max_retries, Some(3));
    assert_eq!(args.emulator_index, Some(2));
    assert!(args.config_path.is_none());
}

#[test]
fn test_global_flags_accepted_after_subcommand() {
    let cli = parse(&["run", "--force-lock", "--verbose", "--log-json"]);
    assert!(cli.verbose);
    assert!(cli.log_json);
    assert!(matches!(cli.command, Commands::Run { force_lock: true }));
}

#[test]
fn test_reset_defaults_to_first_stage_of_first_tier() {
    let cli = parse(&["reset"]);
    assert!(matches!(cli.command, Commands::Reset { tier: 0, stage: 1 }));
    assert_eq!(cli.command.operation(), "reset");
}

#[test]
fn test_locate_parses_target() {
    let cli = parse(&["locate", "settle_confirm.png", "--target", "640, 620", "--json"]);
    match cli.command {
        Commands::Locate {
            template,
            target,
            json,
        } => {
            assert_eq!(template, "settle_confirm.png");
            assert_eq!(target, Some(Point::new(640, 620)));
            assert!(json);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_parse_point_rejects_malformed_input() {
    assert_eq!(parse_point("-5,10"), Ok(Point::new(-5, 10)));
    assert!(parse_point("640").is_err());
    assert!(parse_point("a,1").is_err());
    assert!(parse_point("1,").is_err());
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["autosolo", "launch"]).is_err());
}

#[test]
fn test_reset_writes_checkpoint() {
    let _home = with_isolated_home();
    let config = Config::default();

    commands::execute_reset_command(&config, 2, 5).unwrap();

    let progress = CheckpointStore::new(config.state_file()).load();
    assert_eq!((progress.tier_index, progress.stage_index), (2, 5));
    // The lock taken for the write is released again
    assert!(RunLock::inspect(&config.state_dir()).unwrap().is_none());
}

#[test]
fn test_reset_rejects_out_of_range_values() {
    let _home = with_isolated_home();
    let config = Config::default();

    let err = commands::execute_reset_command(&config, 4, 1).unwrap_err();
    assert_eq!(exit_code_of(&err), ExitCode::CLI_ARGS);

    let err = commands::execute_reset_command(&config, 0, 0).unwrap_err();
    assert_eq!(exit_code_of(&err), ExitCode::CLI_ARGS);

    let err = commands::execute_reset_command(&config, 0, 14).unwrap_err();
    assert_eq!(exit_code_of(&err), ExitCode::CLI_ARGS);

    assert!(!CheckpointStore::new(config.state_file()).exists());
}

#[test]
fn test_reset_refuses_while_lock_is_held() {
    let _home = with_isolated_home();
    let config = Config::default();
    let lock = RunLock::acquire(&config.state_dir(), None, false).unwrap();

    let err = commands::execute_reset_command(&config, 0, 1).unwrap_err();
    assert_eq!(exit_code_of(&err), ExitCode::LOCK_HELD);

    lock.release().unwrap();
}

#[test]
fn test_status_and_config_succeed_without_checkpoint() {
    let _home = with_isolated_home();
    let config = Config::default();

    commands::execute_status_command(&config, false).unwrap();
    commands::execute_status_command(&config, true).unwrap();
    commands::execute_config_command(&config, false).unwrap();
    commands::execute_config_command(&config, true).unwrap();
}
