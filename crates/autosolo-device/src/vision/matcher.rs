use autosolo_utils::error::VisionError;
use autosolo_utils::types::Point;
use camino::Utf8PathBuf;

use super::ncc::{self, Candidate};
use super::{ImageSearch, Match, TemplateLibrary};
use crate::Frame;

/// Coarse candidates re-scored at full resolution.
const TOP_K: usize = 5;

/// Coarse-to-fine normalized cross-correlation over the grayscale frame.
///
/// Templates are first located on a box-downsampled copy of the frame, scaled
/// per axis so a thin template is only reduced along its long side. The best
/// few coarse hits are then refined at full resolution within one coarse
/// pixel. Templates small in both directions are searched exhaustively.
/// Downsampled levels are cached on the [`Frame`].
#[derive(Debug)]
pub struct TemplateMatcher {
    library: TemplateLibrary,
}

impl TemplateMatcher {
    #[must_use]
    pub fn new(assets_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            library: TemplateLibrary::new(assets_dir),
        }
    }

    #[must_use]
    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }
}

impl ImageSearch for TemplateMatcher {
    fn best_match(&self, frame: &Frame, name: &str) -> Result<Option<Match>, VisionError> {
        let prepared = self.library.get(name)?;
        let pyramid = frame.pyramid();
        let screen = pyramid.full();
        let full = &prepared.full;
        if full.width > screen.plane.width || full.height > screen.plane.height {
            return Ok(None);
        }

        let best = match prepared.factor {
            (1, 1) => ncc::search(screen, full, 1).into_iter().next(),
            (fx, fy) => {
                let coarse = pyramid.coarse(fx, fy);
                ncc::search(&coarse, &prepared.coarse, TOP_K)
                    .into_iter()
                    .filter_map(|c| ncc::refine(screen, full, c.x * fx, c.y * fy, fx, fy))
                    .max_by(|a, b| a.score.total_cmp(&b.score))
            }
        };

        Ok(best.map(|Candidate { x, y, score }| {
            let (w, h) = (full.width as i32, full.height as i32);
            let top_left = Point::new(x as i32, y as i32);
            Match {
                center: Point::new(top_left.x + w / 2, top_left.y + h / 2),
                top_left,
                width: full.width as u32,
                height: full.height as u32,
                score,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Template;
    use autosolo_utils::test_support::utf8_tempdir;
    use image::{Rgb, RgbImage, imageops};

    /// Integer hash so no patch of the scene resembles another.
    fn noise(x: u32, y: u32) -> u8 {
        let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA6B);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        (h & 0xFF) as u8
    }

    fn scene(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([noise(x, y), noise(x + 1000, y), noise(x, y + 1000)])
        })
    }

    fn setup(crop: (u32, u32, u32, u32)) -> (tempfile::TempDir, TemplateMatcher, Frame) {
        let (tmp, dir) = utf8_tempdir();
        let screen = scene(320, 240);
        let (x, y, w, h) = crop;
        imageops::crop_imm(&screen, x, y, w, h)
            .to_image()
            .save(dir.join("button.png"))
            .unwrap();
        (tmp, TemplateMatcher::new(dir), Frame::from_rgb(screen))
    }

    #[test]
    fn test_finds_small_template_center() {
        let (_tmp, matcher, frame) = setup((100, 60, 10, 8));
        let center = matcher
            .find(&frame, &Template::new("button.png", 0.9))
            .unwrap();
        assert_eq!(center, Some(Point::new(105, 64)));
    }

    #[test]
    fn test_true_location_outscores_every_other_placement() {
        let (_tmp, matcher, frame) = setup((100, 60, 10, 8));
        let best = matcher.best_match(&frame, "button.png").unwrap().unwrap();
        assert_eq!(best.top_left, Point::new(100, 60));

        let prepared = matcher.library().get("button.png").unwrap();
        let ranked = ncc::search(frame.pyramid().full(), &prepared.full, 2);
        assert_eq!((ranked[0].x, ranked[0].y), (100, 60));
        assert!(ranked[0].score > 0.999);
        assert!(ranked[1].score < 0.9, "runner-up scored {}", ranked[1].score);
    }

    #[test]
    fn test_thin_template_coarse_along_long_axis() {
        let (_tmp, matcher, frame) = setup((120, 200, 96, 10));
        assert_eq!(matcher.library().get("button.png").unwrap().factor, (8, 1));

        let best = matcher.best_match(&frame, "button.png").unwrap().unwrap();
        assert_eq!(best.top_left, Point::new(120, 200));
        assert!(best.score > 0.99);
    }

    #[test]
    fn test_frame_levels_are_built_once() {
        let (_tmp, matcher, frame) = setup((150, 90, 64, 40));
        matcher.best_match(&frame, "button.png").unwrap();
        let first = frame.pyramid() as *const _;
        matcher.best_match(&frame, "button.png").unwrap();
        assert!(std::ptr::eq(first, frame.pyramid()));
    }

    #[test]
    fn test_finds_large_template_via_coarse_pass() {
        let (_tmp, matcher, frame) = setup((150, 90, 64, 40));
        let best = matcher.best_match(&frame, "button.png").unwrap().unwrap();
        assert_eq!(best.top_left, Point::new(150, 90));
        assert_eq!(best.center, Point::new(182, 110));
        assert!(best.score > 0.99);
    }

    #[test]
    fn test_threshold_gates_find() {
        let (_tmp, matcher, frame) = setup((40, 40, 16, 16));
        let other = Frame::from_rgb(RgbImage::from_fn(320, 240, |x, y| {
            let v = (((x / 7) ^ (y / 5)) * 53 % 256) as u8;
            Rgb([v, v, v])
        }));
        let strict = Template::new("button.png", 0.99);
        assert!(matcher.find(&frame, &strict).unwrap().is_some());
        assert!(matcher.find(&other, &strict).unwrap().is_none());
    }

    #[test]
    fn test_template_larger_than_frame() {
        let (_tmp, matcher, _) = setup((0, 0, 100, 100));
        let tiny = Frame::from_rgb(scene(50, 50));
        assert!(matcher.best_match(&tiny, "button.png").unwrap().is_none());
    }
}
