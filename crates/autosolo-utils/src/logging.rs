//! Tracing setup and structured campaign log helpers.

use std::io::IsTerminal;
use tracing::{Level, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Output shape for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Compact,
    /// One JSON object per event, for log shippers
    Json,
}

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// Verbose mode enables debug events from autosolo crates, prints targets,
/// and logs span close events so each stage reports its wall time.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("autosolo=debug,autosolo_engine=debug,autosolo_device=debug,info")
            } else {
                EnvFilter::try_new("info")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events)
                        .with_current_span(true),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(use_color())
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(span_events)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Span wrapping one stage attempt.
pub fn stage_span(tier: usize, stage: u32, difficulty: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "stage",
        tier = tier,
        stage = stage,
        difficulty = %difficulty,
    )
}

pub fn log_stage_start(tier: usize, stage: u32, attempt: u32) {
    info!(tier, stage, attempt, "Starting stage");
}

pub fn log_stage_complete(tier: usize, stage: u32, battles: u32, duration_ms: u128) {
    info!(
        tier,
        stage,
        battles,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

pub fn log_stage_error(tier: usize, stage: u32, error: &str, duration_ms: u128) {
    error!(
        tier,
        stage,
        error = %error,
        duration_ms = %duration_ms,
        "Stage failed"
    );
}

pub fn log_checkpoint_write_failed(tier: usize, stage: u32, error: &str) {
    warn!(
        tier,
        stage,
        error = %error,
        "Checkpoint write failed; progress for this stage will be repeated after a restart"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_span_metadata() {
        let span = stage_span(1, 7, "diff_2.png");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "stage");
            assert!(meta.fields().field("tier").is_some());
            assert!(meta.fields().field("difficulty").is_some());
        }
    }

    #[test]
    fn test_log_helpers_without_subscriber() {
        log_stage_start(0, 1, 1);
        log_stage_complete(0, 1, 3, 1234);
        log_stage_error(0, 1, "battle timed out", 10);
        log_checkpoint_write_failed(0, 1, "disk full");
    }

    #[test]
    fn test_default_format_is_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}
