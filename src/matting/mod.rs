//! Alpha matting refinement of a segmentation mask
//!
//! The mask is turned into a trimap, the unknown band is solved with
//! closed-form matting and the foreground colours are unmixed from the
//! background before composing the RGBA cutout.

pub mod closed_form;
pub mod foreground;
pub mod trimap;

pub use closed_form::{AlphaMatte, ClosedFormMatting};
pub use foreground::estimate_foreground;
pub use trimap::{Trimap, TrimapCounts};

use crate::{config::AlphaMattingOptions, error::BgRemovalError};
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, instrument};

/// Reasons alpha matting cannot produce a cutout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MattingError {
    #[error("trimap has no definite foreground")]
    NoForeground,

    #[error("trimap has no definite background")]
    NoBackground,

    #[error("image of {width}x{height} is smaller than a 3x3 matting window")]
    ImageTooSmall { width: u32, height: u32 },

    #[error("image is {}x{} but mask is {}x{}", image.0, image.1, trimap.0, trimap.1)]
    DimensionMismatch {
        image: (u32, u32),
        trimap: (u32, u32),
    },
}

impl MattingError {
    /// Whether a naive cutout is an acceptable substitute
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::NoForeground | Self::NoBackground | Self::ImageTooSmall { .. }
        )
    }
}

impl From<MattingError> for BgRemovalError {
    fn from(err: MattingError) -> Self {
        BgRemovalError::processing(format!("Alpha matting failed: {err}"))
    }
}

/// Cut out the foreground of `image` using `mask` refined by alpha matting
///
/// # Errors
/// - Trimap lacks a definite foreground or background
/// - Image too small for a matting window
/// - Mask and image sizes differ
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn alpha_matting_cutout(
    image: &DynamicImage,
    mask: &GrayImage,
    options: &AlphaMattingOptions,
) -> Result<RgbaImage, MattingError> {
    if image.width() != mask.width() || image.height() != mask.height() {
        return Err(MattingError::DimensionMismatch {
            image: (image.width(), image.height()),
            trimap: mask.dimensions(),
        });
    }

    let rgb = image.to_rgb8();
    let trimap = Trimap::from_mask(mask, options);
    let counts = trimap.ensure_solvable()?;
    debug!(
        foreground = counts.foreground,
        background = counts.background,
        unknown = counts.unknown,
        "Built trimap"
    );

    let alpha = ClosedFormMatting::default().estimate_alpha(&rgb, &trimap)?;
    let foreground = estimate_foreground(&rgb, &alpha);

    let width = rgb.width() as usize;
    Ok(RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let index = y as usize * width + x as usize;
        let [r, g, b] = foreground.pixel(index);
        Rgba([
            to_u8(r),
            to_u8(g),
            to_u8(b),
            to_u8(alpha.data.get(index).copied().unwrap_or(0.0)),
        ])
    }))
}

/// Scale a `[0, 1]` value to a byte, truncating like an unsigned cast
fn to_u8(value: f64) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}
