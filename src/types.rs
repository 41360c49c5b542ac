//! Core types for background removal results

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
};
use image::{imageops::FilterType, GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Single-channel segmentation mask, 0 = background, 255 = foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Row-major mask values
    pub data: Vec<u8>,
    /// Width and height in pixels
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    #[must_use]
    pub fn from_gray_image(image: &GrayImage) -> Self {
        Self {
            data: image.as_raw().clone(),
            dimensions: image.dimensions(),
        }
    }

    /// Convert to an `image` buffer
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            BgRemovalError::internal(format!(
                "Mask of {} bytes does not fit {width}x{height}",
                self.data.len()
            ))
        })
    }

    /// Value at `(x, y)`, 0 outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        let (width, height) = self.dimensions;
        if x >= width || y >= height {
            return 0;
        }
        self.data
            .get(y as usize * width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Resize with Lanczos3 filtering
    ///
    /// # Errors
    /// - Data length does not match the dimensions
    pub fn resize(&self, width: u32, height: u32) -> Result<Self> {
        if self.dimensions == (width, height) {
            return Ok(self.clone());
        }
        let resized = image::imageops::resize(&self.to_gray_image()?, width, height, FilterType::Lanczos3);
        Ok(Self::from_gray_image(&resized))
    }

    /// Fraction of pixels at or above the midpoint
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v >= 128).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Wall-clock time spent in each pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model resolution and session creation
    pub model_load_ms: u64,
    pub decode_ms: u64,
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    /// Mask extraction and smoothing
    pub postprocessing_ms: u64,
    /// Cutout or alpha matting
    pub compositing_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "decode {}ms, preprocess {}ms, inference {}ms, postprocess {}ms, composite {}ms, encode {}ms, total {}ms",
            self.decode_ms,
            self.preprocessing_ms,
            self.inference_ms,
            self.postprocessing_ms,
            self.compositing_ms,
            self.encode_ms,
            self.total_ms
        )
    }
}

/// Result of removing the background from one image
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Cutout (or the mask itself in mask-only mode)
    pub image: RgbaImage,
    /// Post-processed mask at the original resolution
    pub mask: SegmentationMask,
    pub original_dimensions: (u32, u32),
    /// False when matting was requested but fell back to the plain cutout
    pub matting_applied: bool,
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    /// Encode the image in the given format
    ///
    /// # Errors
    /// - Encoding failed or the format is not compiled in
    pub fn to_bytes(&self, format: OutputFormat) -> Result<Vec<u8>> {
        OutputFormatHandler::encode(&self.image, format)
    }
}
