//! Error reporting for autosolo.
//!
//! Two audiences: the operator at the terminal ([`ErrorReport`],
//! [`utils::create_contextual_report`]) and the post-mortem reader of the
//! crash directory ([`CrashReporter`], [`EvidenceReporter`]).

mod crash;
mod report;

pub use crash::{CrashReporter, EvidenceFiles, EvidenceReporter, NoopReporter};
pub use report::ErrorReport;

pub mod utils {
    pub use crate::report::create_contextual_report;
}
