//! Trimap construction from a segmentation mask

use super::MattingError;
use crate::config::AlphaMattingOptions;
use crate::utils::morphology::binary_erode;
use image::{GrayImage, Luma};

/// Trimap value for definite foreground
pub const FOREGROUND: u8 = 255;
/// Trimap value for definite background
pub const BACKGROUND: u8 = 0;
/// Trimap value for pixels whose opacity must be estimated
pub const UNKNOWN: u8 = 128;

/// Three-level map of definite foreground, definite background and unknown pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimap {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Pixel counts per trimap region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrimapCounts {
    pub foreground: usize,
    pub background: usize,
    pub unknown: usize,
}

impl Trimap {
    /// Build a trimap from a mask
    ///
    /// Mask values above the foreground threshold and below the background
    /// threshold seed the two definite regions. Each region is then eroded
    /// by an `erode_size` square; the foreground treats out-of-image pixels
    /// as outside the region, the background treats them as inside.
    #[must_use]
    pub fn from_mask(mask: &GrayImage, options: &AlphaMattingOptions) -> Self {
        let (width, height) = mask.dimensions();
        let (w, h) = (width as usize, height as usize);
        let size = options.erode_size as usize;

        let is_foreground: Vec<bool> = mask
            .as_raw()
            .iter()
            .map(|&v| v > options.foreground_threshold)
            .collect();
        let is_background: Vec<bool> = mask
            .as_raw()
            .iter()
            .map(|&v| v < options.background_threshold)
            .collect();

        let is_foreground = binary_erode(&is_foreground, w, h, size, false);
        let is_background = binary_erode(&is_background, w, h, size, true);

        let data = is_foreground
            .iter()
            .zip(&is_background)
            .map(|(&fg, &bg)| {
                if bg {
                    BACKGROUND
                } else if fg {
                    FOREGROUND
                } else {
                    UNKNOWN
                }
            })
            .collect();

        Self {
            data,
            width,
            height,
        }
    }

    /// Raw trimap values in row-major order
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Count pixels in each region
    #[must_use]
    pub fn counts(&self) -> TrimapCounts {
        self.data
            .iter()
            .fold(TrimapCounts::default(), |mut counts, &v| {
                match v {
                    FOREGROUND => counts.foreground += 1,
                    BACKGROUND => counts.background += 1,
                    _ => counts.unknown += 1,
                }
                counts
            })
    }

    /// Check that matting is possible: both definite regions must be non-empty
    ///
    /// # Errors
    /// - No definite foreground pixel
    /// - No definite background pixel
    pub fn ensure_solvable(&self) -> Result<TrimapCounts, MattingError> {
        let counts = self.counts();
        if counts.foreground == 0 {
            return Err(MattingError::NoForeground);
        }
        if counts.background == 0 {
            return Err(MattingError::NoBackground);
        }
        Ok(counts)
    }

    /// Render as a grayscale image
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let index = (y as usize) * (self.width as usize) + x as usize;
            Luma([self.data.get(index).copied().unwrap_or(UNKNOWN)])
        })
    }
}
