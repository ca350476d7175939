//! Screen markers resolved from configuration into matcher handles.

use autosolo_config::{Config, TemplateSpec};
use autosolo_device::Template;
use autosolo_utils::types::Offset;
use std::collections::BTreeSet;

/// A template plus the displacement applied when tapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub template: Template,
    pub offset: Offset,
}

impl Marker {
    #[must_use]
    pub fn new(template: Template) -> Self {
        Self {
            template,
            offset: Offset::ZERO,
        }
    }

    fn from_spec(config: &Config, spec: &TemplateSpec) -> Self {
        Self {
            template: Template::new(&spec.file, config.threshold_for(spec)),
            offset: spec.offset,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }
}

/// An interrupt dialog and the button that dismisses it.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalEvent {
    pub trigger: Template,
    pub action: Template,
    pub description: String,
}

/// Every marker the campaign looks for, with thresholds already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignTemplates {
    difficulties: Vec<String>,
    difficulty_threshold: f32,
    confidence: f32,
    stage_pattern: String,
    stage_threshold: f32,
    secondary_pack_from: u32,
    total_stages: u32,

    pub stage_switch: Marker,
    pub primary_pack: Marker,
    pub secondary_pack: Marker,
    pub uncleared_mission: Marker,
    pub auto_off: Marker,
    pub auto_on: Marker,
    pub win: Marker,
    pub lose: Marker,
    pub draw: Marker,
    pub settle_confirm: Marker,
    pub settle_finish: Marker,
    pub settle_dismiss: Marker,
    pub win_finish: Marker,
    pub back: Marker,
    pub lobby: Marker,
    pub lobby_confirm: Marker,
    pub overlay_loading: Marker,
    pub overlay_notice: Marker,
    pub critical_events: Vec<CriticalEvent>,
}

impl CampaignTemplates {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let t = &config.templates;
        let marker = |spec: &TemplateSpec| Marker::from_spec(config, spec);
        let confidence = config.vision.confidence;

        Self {
            difficulties: config.campaign.difficulties.clone(),
            difficulty_threshold: config.timing.difficulty_threshold,
            confidence,
            stage_pattern: config.campaign.stage_template.clone(),
            stage_threshold: config.campaign.stage_threshold,
            secondary_pack_from: config.campaign.secondary_pack_from,
            total_stages: config.campaign.total_stages,

            stage_switch: marker(&t.stage_switch),
            primary_pack: marker(&t.primary_pack),
            secondary_pack: marker(&t.secondary_pack),
            uncleared_mission: marker(&t.uncleared_mission),
            auto_off: marker(&t.auto_off),
            auto_on: marker(&t.auto_on),
            win: marker(&t.win),
            lose: marker(&t.lose),
            draw: marker(&t.draw),
            settle_confirm: marker(&t.settle_confirm),
            settle_finish: marker(&t.settle_finish),
            settle_dismiss: marker(&t.settle_dismiss),
            win_finish: marker(&t.win_finish),
            back: marker(&t.back),
            lobby: marker(&t.lobby),
            lobby_confirm: marker(&t.lobby_confirm),
            overlay_loading: marker(&t.overlay_loading),
            overlay_notice: marker(&t.overlay_notice),
            critical_events: config
                .critical_events
                .iter()
                .map(|event| CriticalEvent {
                    trigger: Template::new(&event.trigger, confidence),
                    action: Template::new(&event.action, confidence),
                    description: event.description.clone(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.difficulties.len()
    }

    #[must_use]
    pub fn total_stages(&self) -> u32 {
        self.total_stages
    }

    /// File name of the difficulty marker for `tier`, if it exists.
    #[must_use]
    pub fn difficulty_name(&self, tier: usize) -> Option<&str> {
        self.difficulties.get(tier).map(String::as_str)
    }

    /// Strict-threshold marker used when scrolling to `tier`.
    #[must_use]
    pub fn difficulty(&self, tier: usize) -> Option<Template> {
        self.difficulty_name(tier)
            .map(|name| Template::new(name, self.difficulty_threshold))
    }

    /// First difficulty marker at the default confidence; its presence means
    /// the difficulty list is on screen.
    #[must_use]
    pub fn difficulty_list(&self) -> Option<Template> {
        self.difficulty_name(0)
            .map(|name| Template::new(name, self.confidence))
    }

    /// Numbered stage marker, e.g. `A7.png`.
    #[must_use]
    pub fn stage(&self, stage: u32) -> Template {
        Template::new(
            self.stage_pattern.replace("{n}", &stage.to_string()),
            self.stage_threshold,
        )
    }

    /// Pack holding `stage`: the secondary pack from `secondary_pack_from` on.
    #[must_use]
    pub fn pack_for(&self, stage: u32) -> &Marker {
        if stage >= self.secondary_pack_from {
            &self.secondary_pack
        } else {
            &self.primary_pack
        }
    }

    fn markers(&self) -> [&Marker; 18] {
        [
            &self.stage_switch,
            &self.primary_pack,
            &self.secondary_pack,
            &self.uncleared_mission,
            &self.auto_off,
            &self.auto_on,
            &self.win,
            &self.lose,
            &self.draw,
            &self.settle_confirm,
            &self.settle_finish,
            &self.settle_dismiss,
            &self.win_finish,
            &self.back,
            &self.lobby,
            &self.lobby_confirm,
            &self.overlay_loading,
            &self.overlay_notice,
        ]
    }

    /// Every distinct template file the campaign can ask for, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.difficulties.iter().cloned().collect();
        names.extend((1..=self.total_stages).map(|n| self.stage(n).name));
        names.extend(self.markers().iter().map(|m| m.template.name.clone()));
        for event in &self.critical_events {
            names.insert(event.trigger.name.clone());
            names.insert(event.action.name.clone());
        }
        names.into_iter().collect()
    }
}
