use autosolo_device::Frame;
use autosolo_utils::error::CampaignError;
use autosolo_utils::types::Point;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Ops;

impl Ops {
    /// Bring the app back to its lobby after a restart, tolerating the two
    /// blocking overlays and any registered interrupt dialog.
    ///
    /// Per frame, in priority order:
    /// 1. a critical event trigger is showing: tap its action and poll again;
    /// 2. lobby visible and the notice overlay (B2) absent: confirm the lobby;
    /// 3. loading overlay (B1) visible without the lobby: keep waiting;
    /// 4. lobby and B2 visible: confirm once B1 has been seen, or once
    ///    `overlay_grace` has passed since B2 first showed.
    ///
    /// Returns `false` when `lobby_timeout` elapses.
    pub fn reacquire_lobby(&self) -> Result<bool, CampaignError> {
        let t = self.timings();
        let templates = self.templates();
        let start = self.clock().now();
        let deadline = start + t.lobby_timeout;

        let mut loading_seen = false;
        let mut notice_since: Option<Duration> = None;

        loop {
            self.run_state().check()?;
            let now = self.clock().now();

            if let Some(frame) = self.capture()
                && !self.dismiss_critical_event(&frame)?
            {
                let lobby = self.locate(&frame, &templates.lobby.template)?;
                let loading = self.locate(&frame, &templates.overlay_loading.template)?.is_some();
                let notice = self.locate(&frame, &templates.overlay_notice.template)?.is_some();

                loading_seen |= loading;
                if notice && notice_since.is_none() {
                    notice_since = Some(now);
                }

                match (lobby, notice) {
                    (Some(at), false) => {
                        if self.confirm_lobby(at)? {
                            return Ok(true);
                        }
                    }
                    (Some(at), true) => {
                        let waited = notice_since.map_or(Duration::ZERO, |since| now.saturating_sub(since));
                        if loading_seen || waited >= t.overlay_grace {
                            debug!(loading_seen, waited_secs = waited.as_secs(), "Proceeding past notice overlay");
                            if self.confirm_lobby(at)? {
                                return Ok(true);
                            }
                        } else {
                            debug!(waited_secs = waited.as_secs(), "Notice overlay over lobby; waiting");
                        }
                    }
                    (None, _) if loading => debug!("Loading overlay; waiting"),
                    (None, _) => {}
                }
            }

            // Reached after a dismissal too, so a dialog that keeps coming
            // back cannot hold the routine past its timeout.
            if self.clock().now() >= deadline {
                warn!(
                    timeout_secs = t.lobby_timeout.as_secs(),
                    "Lobby not reached"
                );
                return Ok(false);
            }
            self.sleep(t.lobby_poll);
        }
    }

    /// Tap the action of the first critical event whose trigger and action
    /// are both on `frame`. Returns whether anything was tapped.
    fn dismiss_critical_event(&self, frame: &Frame) -> Result<bool, CampaignError> {
        for event in &self.templates().critical_events {
            if self.locate(frame, &event.trigger)?.is_none() {
                continue;
            }
            match self.locate(frame, &event.action)? {
                Some(action) => {
                    info!(
                        trigger = %event.trigger.name,
                        description = %event.description,
                        "Dismissing critical event"
                    );
                    self.tap(action)?;
                    return Ok(true);
                }
                None => debug!(trigger = %event.trigger.name, "Critical event without visible action"),
            }
        }
        Ok(false)
    }

    /// Tap the lobby entry until the confirmation marker shows.
    fn confirm_lobby(&self, at: Point) -> Result<bool, CampaignError> {
        let t = self.timings();
        let confirm = &self.templates().lobby_confirm.template;
        for attempt in 1..=t.lobby_confirm_taps {
            self.run_state().check()?;
            self.tap(at)?;
            self.sleep(t.lobby_poll);
            if self.is_visible(confirm)? {
                info!(attempt, "Lobby reached");
                return Ok(true);
            }
        }
        debug!(taps = t.lobby_confirm_taps, "Lobby tapped but not confirmed");
        Ok(false)
    }
}
