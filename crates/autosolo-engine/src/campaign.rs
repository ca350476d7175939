//! Top-level campaign driver: tiers x stages, checkpointing after every
//! confirmed stage and recovering from everything that is not terminal.

use autosolo_config::Config;
use autosolo_device::{DeviceControl, ImageSearch};
use autosolo_error_reporter::CrashReporter;
use autosolo_utils::error::CampaignError;
use autosolo_utils::logging::{
    log_checkpoint_write_failed, log_stage_complete, log_stage_error, log_stage_start, stage_span,
};
use autosolo_utils::types::Offset;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checkpoint::{CampaignProgress, CheckpointStore};
use crate::clock::Clock;
use crate::ops::{Ops, Timings};
use crate::recovery::Recovery;
use crate::run_state::RunState;
use crate::templates::CampaignTemplates;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignSummary {
    pub resumed_from: CampaignProgress,
    pub stages_completed: u32,
    pub battles: u32,
    pub stage_failures: u32,
    pub recoveries: u32,
}

pub struct Campaign {
    ops: Ops,
    recovery: Recovery,
    checkpoint: CheckpointStore,
    reporter: Arc<dyn CrashReporter>,
    stage_retry_limit: u32,
}

impl Campaign {
    pub fn new(
        ops: Ops,
        recovery: Recovery,
        checkpoint: CheckpointStore,
        reporter: Arc<dyn CrashReporter>,
        stage_retry_limit: u32,
    ) -> Self {
        Self {
            ops,
            recovery,
            checkpoint,
            reporter,
            stage_retry_limit,
        }
    }

    /// Wire a campaign from configuration and its collaborators.
    pub fn from_config(
        config: &Config,
        device: Arc<dyn DeviceControl>,
        vision: Arc<dyn ImageSearch>,
        run_state: Arc<RunState>,
        clock: Arc<dyn Clock>,
        reporter: Arc<dyn CrashReporter>,
    ) -> Self {
        let ops = Ops::new(
            device,
            vision,
            run_state,
            clock,
            CampaignTemplates::from_config(config),
            Timings::from_config(config),
        );
        Self::new(
            ops,
            Recovery::from_config(config),
            CheckpointStore::new(config.state_file()),
            reporter,
            config.recovery.stage_retry_limit,
        )
    }

    pub fn ops(&self) -> &Ops {
        &self.ops
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Run from the checkpoint to the end of the last tier.
    ///
    /// Only terminal errors escape: operator stop, exhausted recovery, the
    /// stage retry cap, or a difficulty switch that failed after recovery.
    pub fn run(&self) -> Result<CampaignSummary, CampaignError> {
        let start = self.checkpoint.load();
        let tiers = self.ops.templates().tier_count();
        let total_stages = self.ops.templates().total_stages();
        let mut summary = CampaignSummary {
            resumed_from: start,
            ..CampaignSummary::default()
        };

        info!(
            tiers,
            total_stages,
            checkpoint = %start,
            "Starting campaign"
        );
        if start.tier_index as usize >= tiers {
            info!("Checkpoint is past the last tier; nothing to do");
            return Ok(summary);
        }

        for tier in start.tier_index as usize..tiers {
            let first_stage = if tier == start.tier_index as usize {
                start.resume_stage()
            } else {
                1
            };
            self.enter_tier(tier, &mut summary)?;

            let mut stage = first_stage;
            let mut failures = 0;
            while stage <= total_stages {
                self.ops.run_state().check()?;
                let difficulty = self.ops.templates().difficulty_name(tier).unwrap_or_default();
                let span = stage_span(tier, stage, difficulty);
                let _guard = span.enter();

                log_stage_start(tier, stage, failures + 1);
                let started = self.ops.clock().now();
                let result = self.run_stage(stage);
                let elapsed_ms = self.ops.clock().now().saturating_sub(started).as_millis();

                match result {
                    Ok(battles) => {
                        log_stage_complete(tier, stage, battles, elapsed_ms);
                        self.save(tier, stage);
                        summary.stages_completed += 1;
                        summary.battles += battles;
                        failures = 0;
                        stage += 1;
                    }
                    Err(e) if e.is_terminal() => return Err(e),
                    Err(e) => {
                        log_stage_error(tier, stage, &e.to_string(), elapsed_ms);
                        failures += 1;
                        summary.stage_failures += 1;
                        self.reporter.report(&e, &format!("Diff_{tier}_Level_{stage}"));

                        if self.stage_retry_limit > 0 && failures >= self.stage_retry_limit {
                            return Err(CampaignError::StageRetriesExhausted { tier, stage, failures });
                        }

                        self.recovery.run(&self.ops)?;
                        summary.recoveries += 1;
                        match self.switch_difficulty(tier) {
                            Err(e) if e.is_emergency_stop() => return Err(e),
                            Err(e) => warn!(error = %e, "Difficulty switch after recovery failed"),
                            Ok(()) => {}
                        }
                        self.ops.sleep(self.ops.timings().stage_retry_delay);
                    }
                }
            }

            self.leave_tier()?;
            if tier + 1 < tiers {
                self.save(tier + 1, 1);
            }
            info!(tier, "Tier complete");
        }

        info!(
            stages = summary.stages_completed,
            battles = summary.battles,
            recoveries = summary.recoveries,
            "Campaign complete"
        );
        Ok(summary)
    }

    /// Select `tier`, recovering once if the first switch fails.
    fn enter_tier(&self, tier: usize, summary: &mut CampaignSummary) -> Result<(), CampaignError> {
        match self.switch_difficulty(tier) {
            Ok(()) => Ok(()),
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => {
                warn!(tier, error = %e, "Difficulty switch failed; recovering");
                self.recovery.run(&self.ops)?;
                summary.recoveries += 1;
                self.switch_difficulty(tier)
            }
        }
    }

    /// Scroll the difficulty list to `tier` and select it.
    pub fn switch_difficulty(&self, tier: usize) -> Result<(), CampaignError> {
        let t = self.ops.timings();
        let templates = self.ops.templates();
        let (Some(list), Some(target)) = (templates.difficulty_list(), templates.difficulty(tier)) else {
            return Err(CampaignError::NavigationFailure {
                target: format!("tier {tier}"),
                pages: 0,
            });
        };

        info!(tier, difficulty = %target.name, "Switching difficulty");
        if !self.ops.wait_for_image(&list, t.wait_timeout)? {
            debug!(template = %list.name, "Difficulty list not seen; scrolling anyway");
        }
        self.ops.scroll_search(
            &target,
            t.difficulty_scroll_pages,
            t.scroll_swipe,
            t.difficulty_probe_timeout,
            t.difficulty_scroll_settle,
        )
    }

    /// Interlude then every mission of `stage`. Returns battles fought.
    fn run_stage(&self, stage: u32) -> Result<u32, CampaignError> {
        self.open_stage(stage)?;
        self.ops.clear_missions()
    }

    /// Open the stage switcher, pick the pack holding `stage` and scroll to it.
    fn open_stage(&self, stage: u32) -> Result<(), CampaignError> {
        let ops = &self.ops;
        let t = ops.timings();
        let templates = ops.templates();

        if !ops.click_marker(&templates.stage_switch, t.switcher_timeout)? {
            return Err(CampaignError::ScreenNotReached {
                template: templates.stage_switch.name().to_string(),
                context: "opening the stage switcher".to_string(),
            });
        }
        ops.sleep(t.switcher_settle);

        let pack = templates.pack_for(stage);
        if !ops.click_marker(pack, t.click_timeout)? {
            debug!(pack = pack.name(), "Pack tab not found; assuming already selected");
        }
        ops.sleep(t.pack_settle);

        ops.scroll_search(
            &templates.stage(stage),
            t.stage_scroll_pages,
            t.scroll_swipe,
            t.stage_probe_timeout,
            t.stage_scroll_settle,
        )?;
        ops.sleep(t.interlude_settle);
        Ok(())
    }

    /// Best-effort tap on the back button after a tier's last stage.
    fn leave_tier(&self) -> Result<(), CampaignError> {
        let back = &self.ops.templates().back;
        match self
            .ops
            .click_on_match(&back.template, Offset::ZERO, self.ops.timings().click_timeout)
        {
            Ok(true) => {}
            Ok(false) => debug!("Back button not found"),
            Err(e) if e.is_emergency_stop() => return Err(e),
            Err(e) => warn!(error = %e, "Back button tap failed"),
        }
        Ok(())
    }

    fn save(&self, tier: usize, stage: u32) {
        let tier_index = u32::try_from(tier).unwrap_or(u32::MAX);
        if let Err(e) = self.checkpoint.save(tier_index, stage) {
            log_checkpoint_write_failed(tier, stage, &e.to_string());
        }
    }
}
