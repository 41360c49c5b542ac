//! Foreground colour estimation by two-pass blur fusion
//!
//! A large-radius pass gives a coarse foreground/background estimate that a
//! small-radius pass then refines. Both passes average with imageproc's
//! box filter, which replicates edge pixels beyond the border.

use super::closed_form::AlphaMatte;
use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::box_filter;

/// Window size of the coarse pass
const COARSE_WINDOW: usize = 91;
/// Window size of the refining pass
const FINE_WINDOW: usize = 7;
/// Keeps the fusion denominators away from zero
const FUSION_EPSILON: f64 = 1e-5;

/// Colour planes in `[0, 1]`, one `Vec` per channel
#[derive(Debug, Clone)]
pub struct ColorPlanes {
    pub channels: [Vec<f64>; 3],
    pub width: usize,
    pub height: usize,
}

impl ColorPlanes {
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let n = image.width() as usize * image.height() as usize;
        let mut channels = [
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
        ];
        for pixel in image.pixels() {
            for (plane, &value) in channels.iter_mut().zip(pixel.0.iter()) {
                plane.push(f64::from(value) / 255.0);
            }
        }
        Self {
            channels,
            width: image.width() as usize,
            height: image.height() as usize,
        }
    }

    #[must_use]
    pub fn pixel(&self, index: usize) -> [f64; 3] {
        [
            self.channels[0].get(index).copied().unwrap_or(0.0),
            self.channels[1].get(index).copied().unwrap_or(0.0),
            self.channels[2].get(index).copied().unwrap_or(0.0),
        ]
    }
}

/// Estimate the unmixed foreground colour of every pixel
#[must_use]
pub fn estimate_foreground(image: &RgbImage, alpha: &AlphaMatte) -> ColorPlanes {
    let planes = ColorPlanes::from_rgb(image);
    let (foreground, background) =
        blur_fusion(&planes, &planes, &planes, &alpha.data, COARSE_WINDOW);
    let (foreground, _) = blur_fusion(&planes, &foreground, &background, &alpha.data, FINE_WINDOW);
    foreground
}

/// Mean over a `window x window` neighbourhood of a `[0, 1]` plane
///
/// The plane is quantized to 8 bits for the filter.
fn box_mean(plane: &[f64], width: usize, height: usize, window: usize) -> Vec<f64> {
    let radius = (window / 2) as u32;
    let gray = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = plane
            .get(y as usize * width + x as usize)
            .copied()
            .unwrap_or(0.0);
        Luma([(value * 255.0).round().clamp(0.0, 255.0) as u8])
    });

    box_filter(&gray, radius, radius)
        .into_raw()
        .into_iter()
        .map(|v| f64::from(v) / 255.0)
        .collect()
}

/// One blur-fusion pass; returns the new foreground and the blurred background
fn blur_fusion(
    image: &ColorPlanes,
    foreground: &ColorPlanes,
    background: &ColorPlanes,
    alpha: &[f64],
    window: usize,
) -> (ColorPlanes, ColorPlanes) {
    let (width, height) = (image.width, image.height);
    let blurred_alpha = box_mean(alpha, width, height, window);

    let mut new_foreground = image.clone();
    let mut blurred_background = image.clone();

    for c in 0..3 {
        let weighted_fg: Vec<f64> = foreground.channels[c]
            .iter()
            .zip(alpha)
            .map(|(f, a)| f * a)
            .collect();
        let weighted_bg: Vec<f64> = background.channels[c]
            .iter()
            .zip(alpha)
            .map(|(b, a)| b * (1.0 - a))
            .collect();

        let blurred_fg: Vec<f64> = box_mean(&weighted_fg, width, height, window)
            .into_iter()
            .zip(&blurred_alpha)
            .map(|(v, ba)| v / (ba + FUSION_EPSILON))
            .collect();
        let blurred_bg: Vec<f64> = box_mean(&weighted_bg, width, height, window)
            .into_iter()
            .zip(&blurred_alpha)
            .map(|(v, ba)| v / ((1.0 - ba) + FUSION_EPSILON))
            .collect();

        let fused = &mut new_foreground.channels[c];
        for (i, value) in fused.iter_mut().enumerate() {
            let a = alpha.get(i).copied().unwrap_or(0.0);
            let f = blurred_fg.get(i).copied().unwrap_or(0.0);
            let b = blurred_bg.get(i).copied().unwrap_or(0.0);
            *value = (f + a * (*value - a * f - (1.0 - a) * b)).clamp(0.0, 1.0);
        }

        blurred_background.channels[c] = blurred_bg;
    }

    (new_foreground, blurred_background)
}
