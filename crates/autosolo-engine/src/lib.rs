//! The campaign engine: a tiers x stages loop over a touchscreen app that
//! checkpoints after every confirmed stage and recovers from crashes, freezes
//! and overlays with a bounded, escalating procedure.
//!
//! Everything here is synchronous and runs on one thread. The only
//! cross-thread state is [`RunState`], which operator signals mutate.

pub mod campaign;
pub mod checkpoint;
pub mod clock;
pub mod ops;
pub mod recovery;
pub mod run_state;
pub mod templates;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use campaign::{Campaign, CampaignSummary};
pub use checkpoint::{CampaignProgress, CheckpointStore};
pub use clock::{Clock, SystemClock};
pub use ops::{BattleOutcome, Ops, Timings};
pub use recovery::Recovery;
pub use run_state::RunState;
pub use templates::{CampaignTemplates, CriticalEvent, Marker};
