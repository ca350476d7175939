//! Operator control while a campaign runs.
//!
//! Listeners only flip [`RunState`]; the campaign thread notices at its next
//! check point. Ctrl-C stops, stdin `p`/`pause` toggles pause, `q`/`stop`
//! stops, and on Unix `SIGUSR1` toggles pause.

use std::io::BufRead;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::RunState;

/// A line typed on stdin while the campaign runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    TogglePause,
    Stop,
}

impl OperatorCommand {
    /// Parse one stdin line. Unknown input is `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::TogglePause),
            "q" | "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    /// [`RunState`] logs the transition itself.
    pub fn apply(self, run_state: &RunState) {
        match self {
            Self::TogglePause => {
                run_state.toggle_pause();
            }
            Self::Stop => run_state.signal_stop(),
        }
    }
}

/// Running listeners. Async ones are aborted by [`shutdown`](Self::shutdown);
/// the stdin reader is a detached thread that ends with the process.
pub struct OperatorListeners {
    tasks: Vec<JoinHandle<()>>,
}

impl OperatorListeners {
    /// Start all listeners. Must be called inside a tokio runtime.
    pub fn spawn(run_state: Arc<RunState>) -> Self {
        let mut tasks = Vec::new();

        let ctrl_c_state = Arc::clone(&run_state);
        tasks.push(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => OperatorCommand::Stop.apply(&ctrl_c_state),
                Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
            }
        }));

        #[cfg(unix)]
        {
            let signal_state = Arc::clone(&run_state);
            tasks.push(tokio::spawn(async move {
                use tokio::signal::unix::{SignalKind, signal};
                let mut usr1 = match signal(SignalKind::user_defined1()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, "Cannot listen for SIGUSR1");
                        return;
                    }
                };
                while usr1.recv().await.is_some() {
                    OperatorCommand::TogglePause.apply(&signal_state);
                }
            }));
        }

        let stdin_state = run_state;
        let spawned = std::thread::Builder::new()
            .name("operator-stdin".to_string())
            .spawn(move || read_commands(std::io::stdin().lock(), &stdin_state));
        if let Err(e) = spawned {
            warn!(error = %e, "Cannot start the stdin listener; use Ctrl-C to stop");
        }

        Self { tasks }
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Apply every recognized command read from `input` until EOF or a stop.
pub fn read_commands(input: impl BufRead, run_state: &RunState) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match OperatorCommand::parse(&line) {
            Some(command) => {
                command.apply(run_state);
                if command == OperatorCommand::Stop {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => debug!(input = %line.trim(), "Ignoring unknown operator input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_while(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_parse_accepts_short_and_long_forms() {
        assert_eq!(OperatorCommand::parse("p"), Some(OperatorCommand::TogglePause));
        assert_eq!(OperatorCommand::parse(" Pause \n"), Some(OperatorCommand::TogglePause));
        assert_eq!(OperatorCommand::parse("q"), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("STOP"), Some(OperatorCommand::Stop));
        assert_eq!(OperatorCommand::parse("quit now"), None);
        assert_eq!(OperatorCommand::parse(""), None);
    }

    #[test]
    fn test_pause_twice_resumes() {
        let state = RunState::new();
        read_commands(Cursor::new("p\nnoise\npause\n"), &state);
        assert!(!state.is_paused());
        assert!(!state.is_stopped());
    }

    #[test]
    fn test_each_transition_is_logged_once() {
        let state = RunState::new();
        let log = logged_while(|| read_commands(Cursor::new("p\np\nq\n"), &state));

        assert_eq!(log.matches("Paused").count(), 1, "{log}");
        assert_eq!(log.matches("Resumed").count(), 1, "{log}");
        assert_eq!(log.matches("Stop requested").count(), 1, "{log}");
    }

    #[test]
    fn test_stop_ends_reading() {
        let state = RunState::new();
        read_commands(Cursor::new("p\nq\np\n"), &state);
        assert!(state.is_stopped());
        // The line after stop is never applied
        assert!(state.is_paused());
    }
}
