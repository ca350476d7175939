use autosolo_utils::error::VisionError;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use super::ncc::{Plane, ZeroMean};

/// Coarse level keeps at least this many template pixels along each axis.
const MIN_COARSE_SIDE: usize = 12;
const MAX_FACTOR: usize = 8;

/// A template decoded once and prepared at full and coarse resolution.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub full: ZeroMean,
    pub coarse: ZeroMean,
    /// Downsampling per axis; a thin template is only reduced along its long side
    pub factor: (usize, usize),
}

impl Prepared {
    fn new(plane: &Plane) -> Self {
        let factor = (
            (plane.width / MIN_COARSE_SIDE).clamp(1, MAX_FACTOR),
            (plane.height / MIN_COARSE_SIDE).clamp(1, MAX_FACTOR),
        );
        let coarse = ZeroMean::new(&plane.downsample(factor.0, factor.1));
        Self {
            full: ZeroMean::new(plane),
            coarse,
            factor,
        }
    }
}

/// Template images under the assets directory, decoded lazily and cached.
#[derive(Debug)]
pub struct TemplateLibrary {
    dir: Utf8PathBuf,
    cache: Mutex<HashMap<String, Arc<Prepared>>>,
}

impl TemplateLibrary {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    #[must_use]
    pub fn path_of(&self, name: &str) -> Utf8PathBuf {
        self.dir.join(name)
    }

    /// Load every named template now so a missing file fails fast.
    pub fn preload<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), VisionError> {
        if !self.dir.is_dir() {
            return Err(VisionError::AssetsDirMissing {
                path: self.dir.to_string(),
            });
        }
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Result<Arc<Prepared>, VisionError> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(hit));
        }

        let path = self.path_of(name);
        let image = image::open(&path).map_err(|e| VisionError::TemplateUnreadable {
            name: name.to_string(),
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let prepared = Arc::new(Prepared::new(&Plane::from_luma(&image.to_luma8())));
        debug!(
            template = name,
            width = prepared.full.width,
            height = prepared.full.height,
            factor_x = prepared.factor.0,
            factor_y = prepared.factor.1,
            "Loaded template"
        );

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&prepared));
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosolo_utils::test_support::utf8_tempdir;
    use image::{GrayImage, Luma};

    #[test]
    fn test_missing_template_is_unreadable() {
        let (_tmp, dir) = utf8_tempdir();
        let lib = TemplateLibrary::new(dir);
        assert!(matches!(
            lib.get("nope.png"),
            Err(VisionError::TemplateUnreadable { .. })
        ));
    }

    #[test]
    fn test_preload_requires_assets_dir() {
        let (_tmp, dir) = utf8_tempdir();
        let lib = TemplateLibrary::new(dir.join("missing"));
        assert!(matches!(
            lib.preload(["a.png"]),
            Err(VisionError::AssetsDirMissing { .. })
        ));
    }

    #[test]
    fn test_coarse_factor_scales_with_size() {
        let (_tmp, dir) = utf8_tempdir();
        GrayImage::from_fn(100, 50, |x, y| Luma([((x * 7 + y * 3) % 255) as u8]))
            .save(dir.join("big.png"))
            .unwrap();
        GrayImage::from_fn(10, 10, |x, y| Luma([((x + y) * 10) as u8]))
            .save(dir.join("small.png"))
            .unwrap();
        GrayImage::from_fn(200, 20, |x, y| Luma([((x * 5 + y * 11) % 255) as u8]))
            .save(dir.join("bar.png"))
            .unwrap();

        let lib = TemplateLibrary::new(dir);
        assert_eq!(lib.get("big.png").unwrap().factor, (8, 4));
        assert_eq!(lib.get("small.png").unwrap().factor, (1, 1));
        assert_eq!(lib.get("bar.png").unwrap().factor, (8, 1));
        // cached
        assert!(Arc::ptr_eq(&lib.get("big.png").unwrap(), &lib.get("big.png").unwrap()));
    }
}
