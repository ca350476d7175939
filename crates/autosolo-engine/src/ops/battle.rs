//! Mission selection and the battle sequence inside a stage.

use autosolo_utils::error::CampaignError;
use autosolo_utils::types::Point;
use tracing::{debug, info, warn};

use super::{BattleOutcome, Ops};

impl Ops {
    /// Scroll the mission list to its end so uncleared missions are on screen.
    pub fn swipe_to_bottom(&self) -> Result<(), CampaignError> {
        let t = self.timings();
        for _ in 0..t.mission_bottom_swipes {
            self.run_state().check()?;
            self.swipe(t.mission_swipe)?;
            self.sleep(t.mission_swipe_gap);
        }
        self.sleep(t.mission_settle);
        Ok(())
    }

    /// Location of the next uncleared mission, or `None` when the stage is
    /// done. Fails when the stage-select screen itself is not showing.
    pub fn find_uncleared_mission(&self) -> Result<Option<Point>, CampaignError> {
        self.swipe_to_bottom()?;
        self.run_state().check()?;

        let templates = self.templates();
        let Some(frame) = self.capture() else {
            return Err(not_at_stage_select(templates.stage_switch.name()));
        };
        if self.locate(&frame, &templates.stage_switch.template)?.is_none() {
            return Err(not_at_stage_select(templates.stage_switch.name()));
        }
        self.locate(&frame, &templates.uncleared_mission.template)
    }

    /// Enter `mission`, turn auto-play on and see the battle through to the
    /// stage-select screen.
    pub fn fight(&self, mission: Point) -> Result<BattleOutcome, CampaignError> {
        let t = self.timings();
        let templates = self.templates();

        info!(%mission, "Engaging mission");
        self.tap(mission)?;
        self.sleep(t.engage_settle);

        // Toggling auto off then on leaves it on whatever state the game restored.
        if !self.click_marker(&templates.auto_off, t.click_timeout)? {
            debug!("Auto-play toggle not found");
        }
        self.sleep(t.auto_toggle_gap);
        if !self.click_marker(&templates.auto_on, t.click_timeout)? {
            debug!("Auto-play confirm not found");
        }

        let outcome = self.poll_outcome(
            &templates.win.template,
            &templates.lose.template,
            &templates.draw.template,
            t.battle_timeout,
        )?;

        match outcome {
            BattleOutcome::Win => {
                self.settle()?;
                if !self.click_marker(&templates.win_finish, t.click_timeout)? {
                    warn!(template = templates.win_finish.name(), "Victory screen not dismissed");
                }
            }
            BattleOutcome::Lose => {
                self.settle()?;
                if !self.wait_for_image(&templates.stage_switch.template, t.wait_timeout)? {
                    warn!("Stage select did not come back after a loss");
                }
            }
            BattleOutcome::Timeout => {
                return Err(CampaignError::BattleTimeout {
                    timeout_secs: t.battle_timeout.as_secs(),
                });
            }
        }
        Ok(outcome)
    }

    fn settle(&self) -> Result<(), CampaignError> {
        let t = self.timings();
        let templates = self.templates();
        if !self.clear_settlement(
            &templates.settle_confirm.template,
            &templates.settle_finish.template,
            t.settle_max_taps,
        )? {
            warn!("Settlement screens not cleared");
        }
        self.click_marker(&templates.settle_dismiss, t.click_timeout)?;
        Ok(())
    }

    /// Fight every uncleared mission of the current stage. Returns how many
    /// battles were fought.
    pub fn clear_missions(&self) -> Result<u32, CampaignError> {
        let mut battles = 0;
        while let Some(mission) = self.find_uncleared_mission()? {
            let outcome = self.fight(mission)?;
            battles += 1;
            debug!(battles, ?outcome, "Battle finished");
            self.sleep(self.timings().between_missions);
        }
        Ok(battles)
    }
}

fn not_at_stage_select(template: &str) -> CampaignError {
    CampaignError::ScreenNotReached {
        template: template.to_string(),
        context: "looking for uncleared missions".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::Clock;
    use crate::ops::BattleOutcome;
    use crate::testing::{FakeDevice, Tap, harness, script_battle};
    use autosolo_utils::error::CampaignError;
    use autosolo_utils::types::Point;

    #[test]
    fn test_missing_stage_select_is_screen_not_reached() {
        let (_device, _clock, ops) = harness(FakeDevice::new());
        let err = ops.find_uncleared_mission().unwrap_err();
        assert!(matches!(err, CampaignError::ScreenNotReached { ref template, .. } if template == "change.png"));
    }

    #[test]
    fn test_no_uncleared_mission_ends_stage() {
        let device = FakeDevice::new();
        device.show("change.png", Point::new(50, 50));
        let (device, _clock, ops) = harness(device);

        assert_eq!(ops.clear_missions().unwrap(), 0);
        // five bottom swipes, nothing else
        assert_eq!(device.swipes(), 5);
        assert!(device.taps().iter().all(|t| matches!(t, Tap::Swipe(_))));
    }

    #[test]
    fn test_won_battle_runs_full_sequence() {
        let device = FakeDevice::new();
        script_battle(&device, BattleOutcome::Win, 2);
        let (device, _clock, ops) = harness(device);

        assert_eq!(ops.clear_missions().unwrap(), 2);
        let points: Vec<Point> = device
            .taps()
            .into_iter()
            .filter_map(|t| match t {
                Tap::At(p) => Some(p),
                Tap::Swipe(_) => None,
            })
            .collect();
        assert!(points.contains(&crate::testing::points::WIN));
        assert!(points.contains(&crate::testing::points::WIN_FINISH));
        // Auto_on is tapped at its offset, not its center
        assert!(points.contains(&Point::new(
            crate::testing::points::AUTO_ON.x - 231,
            crate::testing::points::AUTO_ON.y - 133
        )));
    }

    #[test]
    fn test_lost_battle_skips_victory_tap() {
        let device = FakeDevice::new();
        script_battle(&device, BattleOutcome::Lose, 1);
        let (device, _clock, ops) = harness(device);

        assert_eq!(ops.clear_missions().unwrap(), 1);
        assert!(!device.taps().contains(&Tap::At(crate::testing::points::WIN_FINISH)));
        assert!(!device.taps().contains(&Tap::At(crate::testing::points::WIN)));
    }

    #[test]
    fn test_battle_timeout_is_an_error() {
        let device = FakeDevice::new();
        device.show("change.png", Point::new(50, 50));
        device.show("unclear.png", Point::new(700, 900));
        let (_device, clock, ops) = harness(device);

        let err = ops.clear_missions().unwrap_err();
        assert!(matches!(err, CampaignError::BattleTimeout { timeout_secs: 1200 }));
        assert!(clock.now() >= std::time::Duration::from_secs(1200));
    }
}
