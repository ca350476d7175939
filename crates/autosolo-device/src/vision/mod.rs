//! Template matching on captured frames.

mod library;
mod matcher;
mod ncc;

pub use library::TemplateLibrary;
pub use matcher::TemplateMatcher;
pub(crate) use ncc::Pyramid;

use autosolo_utils::error::VisionError;
use autosolo_utils::types::Point;
use serde::Serialize;

use crate::Frame;

/// A reference image by file name plus the minimum score accepted as a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub threshold: f32,
}

impl Template {
    #[must_use]
    pub fn new(name: impl Into<String>, threshold: f32) -> Self {
        Self {
            name: name.into(),
            threshold,
        }
    }
}

/// Best placement of a template on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Match {
    pub center: Point,
    pub top_left: Point,
    pub width: u32,
    pub height: u32,
    /// Normalized cross-correlation in [-1, 1]
    pub score: f32,
}

/// Locates templates on frames.
pub trait ImageSearch: Send + Sync {
    /// Center of `template` on `frame` if its best score reaches the threshold.
    fn find(&self, frame: &Frame, template: &Template) -> Result<Option<Point>, VisionError> {
        Ok(self
            .best_match(frame, &template.name)?
            .filter(|m| m.score >= template.threshold)
            .map(|m| m.center))
    }

    /// Highest-scoring placement regardless of threshold. `None` when the
    /// template does not fit inside the frame.
    fn best_match(&self, frame: &Frame, name: &str) -> Result<Option<Match>, VisionError>;
}
