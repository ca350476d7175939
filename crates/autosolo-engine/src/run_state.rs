use autosolo_utils::error::CampaignError;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::info;

/// How often a paused caller logs that it is still waiting.
const PAUSE_LOG_EVERY: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy)]
struct Signal {
    paused: bool,
    stopped: bool,
}

/// Process-wide pause/stop signal, observed cooperatively by every wait loop.
///
/// Operator threads call [`toggle_pause`](Self::toggle_pause) and
/// [`signal_stop`](Self::signal_stop); the campaign thread calls
/// [`check`](Self::check) between attempts.
#[derive(Debug)]
pub struct RunState {
    signal: Mutex<Signal>,
    changed: Condvar,
    granularity: Duration,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::with_granularity(Duration::from_millis(200))
    }

    #[must_use]
    pub fn with_granularity(granularity: Duration) -> Self {
        Self {
            signal: Mutex::new(Signal::default()),
            changed: Condvar::new(),
            granularity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request a stop. Paused callers wake and receive `EmergencyStop`.
    pub fn signal_stop(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
        info!("Stop requested");
    }

    /// Flip pause. Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        let paused = {
            let mut signal = self.lock();
            signal.paused = !signal.paused;
            signal.paused
        };
        self.changed.notify_all();
        if paused {
            info!("Paused; toggle again to resume");
        } else {
            info!("Resumed");
        }
        paused
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Returns at once when running, blocks while paused, and fails with
    /// `EmergencyStop` once a stop has been signalled.
    pub fn check(&self) -> Result<(), CampaignError> {
        let mut signal = self.lock();
        let mut paused_since: Option<Instant> = None;
        let mut last_log = Instant::now();

        loop {
            if signal.stopped {
                return Err(CampaignError::EmergencyStop);
            }
            if !signal.paused {
                if let Some(since) = paused_since {
                    info!(paused_secs = since.elapsed().as_secs(), "Continuing after pause");
                }
                return Ok(());
            }

            let since = *paused_since.get_or_insert_with(Instant::now);
            if last_log.elapsed() >= PAUSE_LOG_EVERY {
                info!(paused_secs = since.elapsed().as_secs(), "Still paused");
                last_log = Instant::now();
            }

            signal = self
                .changed
                .wait_timeout(signal, self.granularity)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
