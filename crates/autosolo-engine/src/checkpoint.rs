//! Durable `(tier_index, stage_index)` progress record.

use autosolo_utils::atomic_write::write_json_atomic;
use autosolo_utils::error::CheckpointError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Last confirmed progress. `stage_index` is 1-based; a stored 0 means the
/// tier has not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CampaignProgress {
    #[serde(alias = "diff_index")]
    pub tier_index: u32,
    #[serde(alias = "package_n")]
    pub stage_index: u32,
}

impl CampaignProgress {
    #[must_use]
    pub const fn new(tier_index: u32, stage_index: u32) -> Self {
        Self {
            tier_index,
            stage_index,
        }
    }

    /// First stage to run in the resume tier.
    #[must_use]
    pub fn resume_stage(self) -> u32 {
        self.stage_index.max(1)
    }
}

impl fmt::Display for CampaignProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} stage {}", self.tier_index, self.stage_index)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: Utf8PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persisted progress, or `(0, 0)` when the file is absent or unreadable.
    #[must_use]
    pub fn load(&self) -> CampaignProgress {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path, "No checkpoint found; starting from the beginning");
                return CampaignProgress::default();
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "Checkpoint unreadable; starting from the beginning");
                return CampaignProgress::default();
            }
        };

        match serde_json::from_str::<CampaignProgress>(&content) {
            Ok(progress) => {
                debug!(path = %self.path, %progress, "Loaded checkpoint");
                progress
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "Checkpoint corrupt; starting from the beginning");
                CampaignProgress::default()
            }
        }
    }

    /// Replace the record with `(tier_index, stage_index)`.
    pub fn save(&self, tier_index: u32, stage_index: u32) -> Result<(), CheckpointError> {
        let progress = CampaignProgress::new(tier_index, stage_index);
        write_json_atomic(&self.path, &progress).map_err(|e| CheckpointError::Write {
            path: self.path.to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!(path = %self.path, %progress, "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_utils::test_support::utf8_tempdir;
    use proptest::prelude::*;

    #[test]
    fn test_missing_file_loads_default() {
        let (_tmp, dir) = utf8_tempdir();
        let store = CheckpointStore::new(dir.join("state.json"));
        assert!(!store.exists());
        assert_eq!(store.load(), CampaignProgress::new(0, 0));
    }

    #[test]
    fn test_corrupt_file_loads_default() {
        let (_tmp, dir) = utf8_tempdir();
        let path = dir.join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), CampaignProgress::default());

        std::fs::write(&path, r#"{"tier_index": -1, "stage_index": 2}"#).unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), CampaignProgress::default());
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let (_tmp, dir) = utf8_tempdir();
        let path = dir.join("state.json");
        std::fs::write(&path, r#"{"diff_index": 2, "package_n": 9}"#).unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), CampaignProgress::new(2, 9));
    }

    #[test]
    fn test_save_writes_canonical_field_names() {
        let (_tmp, dir) = utf8_tempdir();
        let store = CheckpointStore::new(dir.join("nested/state.json"));
        store.save(1, 3).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"tier_index": 1, "stage_index": 3}));
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let (_tmp, dir) = utf8_tempdir();
        let store = CheckpointStore::new(dir.join("state.json"));
        store.save(3, 13).unwrap();
        store.save(0, 1).unwrap();
        assert_eq!(store.load(), CampaignProgress::new(0, 1));
    }

    #[test]
    fn test_resume_stage_treats_zero_as_one() {
        assert_eq!(CampaignProgress::new(0, 0).resume_stage(), 1);
        assert_eq!(CampaignProgress::new(2, 7).resume_stage(), 7);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_save_then_load_round_trips(tier in any::<u32>(), stage in any::<u32>()) {
            let (_tmp, dir) = utf8_tempdir();
            let store = CheckpointStore::new(dir.join("state.json"));
            store.save(tier, stage).unwrap();
            prop_assert_eq!(store.load(), CampaignProgress::new(tier, stage));
        }
    }
}
