//! Image preprocessing for model inference

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

/// Guard against division by zero for all-black inputs
const MIN_PIXEL_MAX: f32 = 1e-6;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into a normalized NCHW tensor
    ///
    /// Steps:
    /// - RGB conversion
    /// - Lanczos3 resize to the (square) model input size, ignoring aspect ratio
    /// - scaling by the largest channel value of the resized image
    /// - per-channel mean/std normalization
    ///
    /// # Errors
    /// - Zero-sized target
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model input size must be non-zero",
            ));
        }

        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb_image,
            target_width,
            target_height,
            FilterType::Lanczos3,
        );

        let max_value = resized
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(0.0, f32::from)
            .max(MIN_PIXEL_MAX);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor =
            Array4::<f32>::zeros((1, 3, target_height as usize, target_width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for (c, (&m, &s)) in mean.iter().zip(std.iter()).enumerate() {
                let value = f32::from(pixel[c]) / max_value;
                if let Some(slot) = tensor.get_mut([0, c, y as usize, x as usize]) {
                    *slot = (value - m) / s;
                }
            }
        }

        Ok(tensor)
    }
}
