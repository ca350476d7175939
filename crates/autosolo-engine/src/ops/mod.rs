//! Polling primitives shared by the campaign and recovery.
//!
//! Every primitive is synchronous, calls [`RunState::check`] before each
//! attempt, and reads time through the injected [`Clock`]. A failed screen
//! capture counts as "nothing matched this frame"; "not found yet" is a
//! `false`/`None` value, never an error.

mod battle;
mod lobby;

use autosolo_config::Config;
use autosolo_device::{DeviceControl, Frame, ImageSearch, Template};
use autosolo_utils::error::CampaignError;
use autosolo_utils::types::{Offset, Point, Swipe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::clock::Clock;
use crate::run_state::RunState;
use crate::templates::{CampaignTemplates, Marker};

/// Result of polling for the end of a battle. A draw counts as a loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    Win,
    Lose,
    Timeout,
}

/// Poll intervals, timeouts and settle delays, converted once from `[timing]`
/// and `[recovery]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    pub click_poll: Duration,
    pub click_timeout: Duration,
    pub wait_poll: Duration,
    pub wait_timeout: Duration,

    pub switcher_timeout: Duration,
    pub switcher_settle: Duration,
    pub pack_settle: Duration,
    pub interlude_settle: Duration,
    pub stage_scroll_pages: u32,
    pub stage_scroll_settle: Duration,
    pub stage_probe_timeout: Duration,
    pub scroll_swipe: Swipe,
    pub difficulty_scroll_pages: u32,
    pub difficulty_scroll_settle: Duration,
    pub difficulty_probe_timeout: Duration,

    pub mission_bottom_swipes: u32,
    pub mission_swipe: Swipe,
    pub mission_swipe_gap: Duration,
    pub mission_settle: Duration,
    pub engage_settle: Duration,
    pub auto_toggle_gap: Duration,
    pub battle_timeout: Duration,
    pub outcome_poll: Duration,
    pub win_tap_settle: Duration,
    pub settle_max_taps: u32,
    pub settle_tap_interval: Duration,
    pub settle_press_ms: u64,
    pub between_missions: Duration,
    pub stage_retry_delay: Duration,

    pub lobby_timeout: Duration,
    pub lobby_poll: Duration,
    pub lobby_confirm_taps: u32,
    pub overlay_grace: Duration,
}

impl Timings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let t = &config.timing;
        let r = &config.recovery;
        let ms = Duration::from_millis;
        let secs = Duration::from_secs;

        Self {
            click_poll: ms(t.click_poll_ms),
            click_timeout: secs(t.click_timeout_secs),
            wait_poll: ms(t.wait_poll_ms),
            wait_timeout: secs(t.wait_timeout_secs),

            switcher_timeout: secs(t.switcher_timeout_secs),
            switcher_settle: ms(t.switcher_settle_ms),
            pack_settle: ms(t.pack_settle_ms),
            interlude_settle: ms(t.interlude_settle_ms),
            stage_scroll_pages: t.stage_scroll_pages,
            stage_scroll_settle: ms(t.stage_scroll_settle_ms),
            stage_probe_timeout: secs(t.stage_probe_timeout_secs),
            scroll_swipe: t.stage_swipe,
            difficulty_scroll_pages: t.difficulty_scroll_pages,
            difficulty_scroll_settle: ms(t.difficulty_scroll_settle_ms),
            difficulty_probe_timeout: secs(t.difficulty_probe_timeout_secs),

            mission_bottom_swipes: t.mission_bottom_swipes,
            mission_swipe: t.mission_swipe,
            mission_swipe_gap: ms(t.mission_swipe_gap_ms),
            mission_settle: ms(t.mission_settle_ms),
            engage_settle: ms(t.engage_settle_ms),
            auto_toggle_gap: ms(t.auto_toggle_gap_ms),
            battle_timeout: secs(t.battle_timeout_secs),
            outcome_poll: secs(t.outcome_poll_secs),
            win_tap_settle: ms(t.win_tap_settle_ms),
            settle_max_taps: t.settle_max_taps,
            settle_tap_interval: ms(t.settle_tap_interval_ms),
            settle_press_ms: t.settle_press_ms,
            between_missions: secs(t.between_missions_secs),
            stage_retry_delay: secs(t.stage_retry_delay_secs),

            lobby_timeout: secs(r.lobby_timeout_secs),
            lobby_poll: ms(r.lobby_poll_ms),
            lobby_confirm_taps: r.lobby_confirm_taps,
            overlay_grace: secs(r.overlay_grace_secs),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The primitive library: capture, match, tap, and wait, all observing
/// pause/stop.
pub struct Ops {
    device: Arc<dyn DeviceControl>,
    vision: Arc<dyn ImageSearch>,
    run_state: Arc<RunState>,
    clock: Arc<dyn Clock>,
    templates: CampaignTemplates,
    timings: Timings,
}

impl Ops {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        vision: Arc<dyn ImageSearch>,
        run_state: Arc<RunState>,
        clock: Arc<dyn Clock>,
        templates: CampaignTemplates,
        timings: Timings,
    ) -> Self {
        Self {
            device,
            vision,
            run_state,
            clock,
            templates,
            timings,
        }
    }

    pub fn device(&self) -> &dyn DeviceControl {
        self.device.as_ref()
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn templates(&self) -> &CampaignTemplates {
        &self.templates
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// One screenshot, or `None` when the device could not deliver one.
    pub fn capture(&self) -> Option<Frame> {
        match self.device.capture_screen() {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(error = %e, "Screen capture failed; treating as no match");
                None
            }
        }
    }

    /// Center of `template` on `frame`, if it clears its threshold.
    pub fn locate(&self, frame: &Frame, template: &Template) -> Result<Option<Point>, CampaignError> {
        Ok(self.vision.find(frame, template)?)
    }

    /// Single capture-and-match.
    pub fn is_visible(&self, template: &Template) -> Result<bool, CampaignError> {
        self.run_state.check()?;
        match self.capture() {
            Some(frame) => Ok(self.locate(&frame, template)?.is_some()),
            None => Ok(false),
        }
    }

    pub fn tap(&self, at: Point) -> Result<(), CampaignError> {
        trace!(%at, "tap");
        Ok(self.device.tap(at)?)
    }

    pub fn swipe(&self, swipe: Swipe) -> Result<(), CampaignError> {
        trace!(from = %swipe.from, to = %swipe.to, ms = swipe.duration_ms, "swipe");
        Ok(self.device.swipe(swipe)?)
    }

    /// Poll until `template` is on screen or `timeout` elapses. Never taps.
    pub fn wait_for_image(&self, template: &Template, timeout: Duration) -> Result<bool, CampaignError> {
        let deadline = self.clock.now() + timeout;
        loop {
            self.run_state.check()?;
            if let Some(frame) = self.capture()
                && self.locate(&frame, template)?.is_some()
            {
                return Ok(true);
            }
            if self.clock.now() >= deadline {
                debug!(template = %template.name, timeout_secs = timeout.as_secs(), "Wait timed out");
                return Ok(false);
            }
            self.clock.sleep(self.timings.wait_poll);
        }
    }

    /// Poll for `template` and tap `center + offset` once when it appears.
    ///
    /// `timeout = 0` is a single probe without sleeping. The effect of the
    /// tap is not verified.
    pub fn click_on_match(
        &self,
        template: &Template,
        offset: Offset,
        timeout: Duration,
    ) -> Result<bool, CampaignError> {
        let deadline = self.clock.now() + timeout;
        loop {
            self.run_state.check()?;
            if let Some(frame) = self.capture()
                && let Some(center) = self.locate(&frame, template)?
            {
                let target = center.offset_by(offset);
                debug!(template = %template.name, %center, %target, "Tapping match");
                self.tap(target)?;
                return Ok(true);
            }
            if self.clock.now() >= deadline {
                return Ok(false);
            }
            self.clock.sleep(self.timings.click_poll);
        }
    }

    /// [`click_on_match`](Self::click_on_match) with the marker's own offset.
    pub fn click_marker(&self, marker: &Marker, timeout: Duration) -> Result<bool, CampaignError> {
        self.click_on_match(&marker.template, marker.offset, timeout)
    }

    /// Page through a scrolling list until `template` can be tapped.
    pub fn scroll_search(
        &self,
        template: &Template,
        max_pages: u32,
        swipe: Swipe,
        probe_timeout: Duration,
        settle: Duration,
    ) -> Result<(), CampaignError> {
        for page in 1..=max_pages {
            self.run_state.check()?;
            if self.click_on_match(template, Offset::ZERO, probe_timeout)? {
                debug!(template = %template.name, page, "Found while scrolling");
                return Ok(());
            }
            self.swipe(swipe)?;
            self.clock.sleep(settle);
        }
        info!(template = %template.name, pages = max_pages, "Not found after scrolling");
        Err(CampaignError::NavigationFailure {
            target: template.name.clone(),
            pages: max_pages,
        })
    }

    /// Poll for the end of a battle every `outcome_poll`.
    ///
    /// Win is checked first and its center tapped; lose or draw return
    /// `Lose` without tapping.
    pub fn poll_outcome(
        &self,
        win: &Template,
        lose: &Template,
        draw: &Template,
        timeout: Duration,
    ) -> Result<BattleOutcome, CampaignError> {
        let deadline = self.clock.now() + timeout;
        loop {
            self.run_state.check()?;
            if let Some(frame) = self.capture() {
                if let Some(center) = self.locate(&frame, win)? {
                    info!("Battle won");
                    self.tap(center)?;
                    self.clock.sleep(self.timings.win_tap_settle);
                    return Ok(BattleOutcome::Win);
                }
                if self.locate(&frame, lose)?.is_some() || self.locate(&frame, draw)?.is_some() {
                    info!("Battle lost or drawn");
                    return Ok(BattleOutcome::Lose);
                }
            }
            if self.clock.now() >= deadline {
                return Ok(BattleOutcome::Timeout);
            }
            self.clock.sleep(self.timings.outcome_poll);
        }
    }

    /// Dismiss the post-battle settlement screens.
    ///
    /// Waits for `confirm`, then up to `max_taps` times presses it while
    /// visible and returns `true` as soon as `finish` shows in the same frame.
    pub fn clear_settlement(
        &self,
        confirm: &Template,
        finish: &Template,
        max_taps: u32,
    ) -> Result<bool, CampaignError> {
        if !self.wait_for_image(confirm, self.timings.wait_timeout)? {
            debug!(template = %confirm.name, "Settlement confirm never appeared; polling anyway");
        }

        for _ in 0..max_taps {
            self.run_state.check()?;
            let Some(frame) = self.capture() else {
                self.clock.sleep(self.timings.settle_tap_interval);
                continue;
            };
            if let Some(center) = self.locate(&frame, confirm)? {
                self.swipe(Swipe::press(center, self.timings.settle_press_ms))?;
            }
            self.clock.sleep(self.timings.settle_tap_interval);
            if self.locate(&frame, finish)?.is_some() {
                return Ok(true);
            }
        }
        debug!(max_taps, "Settlement not cleared");
        Ok(false)
    }
}
