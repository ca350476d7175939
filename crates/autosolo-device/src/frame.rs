use autosolo_utils::error::DeviceError;
use camino::Utf8Path;
use image::{GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use crate::vision::Pyramid;

/// One captured screen.
///
/// The grayscale plane and its matching pyramid are computed on first use
/// and shared by every template searched against the same frame.
#[derive(Debug, Clone)]
pub struct Frame {
    rgb: RgbImage,
    luma: OnceLock<GrayImage>,
    pyramid: OnceLock<Arc<Pyramid>>,
}

impl Frame {
    #[must_use]
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self {
            rgb,
            luma: OnceLock::new(),
            pyramid: OnceLock::new(),
        }
    }

    /// Decode a PNG as produced by `screencap -p`.
    pub fn from_png(bytes: &[u8]) -> Result<Self, DeviceError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| {
            DeviceError::CaptureDecode {
                reason: format!("{e} ({} bytes)", bytes.len()),
            }
        })?;
        Ok(Self::from_rgb(decoded.to_rgb8()))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    #[must_use]
    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    #[must_use]
    pub fn luma(&self) -> &GrayImage {
        self.luma.get_or_init(|| image::imageops::grayscale(&self.rgb))
    }

    pub(crate) fn pyramid(&self) -> &Pyramid {
        self.pyramid.get_or_init(|| Arc::new(Pyramid::new(self.luma())))
    }

    pub fn to_png(&self) -> Result<Vec<u8>, DeviceError> {
        let mut buf = Vec::new();
        self.rgb
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| DeviceError::CaptureDecode {
                reason: format!("PNG encode failed: {e}"),
            })?;
        Ok(buf)
    }

    pub fn save_png(&self, path: &Utf8Path) -> Result<(), DeviceError> {
        let bytes = self.to_png()?;
        std::fs::write(path, bytes).map_err(|e| DeviceError::CommandFailed {
            command: format!("write {path}"),
            reason: e.to_string(),
        })
    }
}
