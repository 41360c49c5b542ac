//! Shared helpers for integration tests
//!
//! The mock backend predicts a centered disc so the full pipeline can run
//! without downloading real model weights.

#![allow(dead_code)]

pub mod onnx;

use bgremove_invoker::{
    error::Result,
    inference::InferenceBackend,
    models::{ModelManager, ModelSpec, PreprocessingConfig},
    processor::{BackendFactory, BackendType, BackgroundRemovalProcessor},
    InvokerConfig, InvokerConfigBuilder,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

/// Disc radius relative to the shorter image side
pub const SUBJECT_RADIUS: f32 = 1.0 / 3.0;

/// Backend that predicts a soft-edged disc in the middle of its input
pub struct DiscBackend {
    target_size: u32,
    initialized: bool,
}

impl DiscBackend {
    pub fn new(target_size: u32) -> Self {
        Self {
            target_size,
            initialized: false,
        }
    }
}

impl InferenceBackend for DiscBackend {
    fn initialize(&mut self, _config: &InvokerConfig) -> Result<Option<instant::Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(instant::Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (_, _, height, width) = input.dim();
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let radius = width.min(height) as f32 * SUBJECT_RADIUS;

        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            // One pixel wide ramp across the disc edge
            (radius - distance + 0.5).clamp(0.0, 1.0)
        }))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [self.target_size, self.target_size],
            ..PreprocessingConfig::u2net()
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out [`DiscBackend`]s regardless of the requested type
pub struct DiscBackendFactory {
    pub target_size: u32,
}

impl Default for DiscBackendFactory {
    fn default() -> Self {
        Self { target_size: 64 }
    }
}

impl BackendFactory for DiscBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(DiscBackend::new(self.target_size)))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

/// Placeholder weights file; the mock backend never parses it
pub fn dummy_model_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create model file");
    file.write_all(b"not really onnx").expect("write model file");
    file
}

/// Configuration builder pointing at `model_file`
pub fn config_builder(model_file: &NamedTempFile) -> InvokerConfigBuilder {
    InvokerConfig::builder().model(ModelSpec::external(model_file.path()))
}

/// Processor running the disc backend
pub fn disc_processor(config: InvokerConfig) -> BackgroundRemovalProcessor {
    BackgroundRemovalProcessor::with_factory(config, Box::new(DiscBackendFactory::default()))
        .expect("create processor")
}

/// Red disc on a blue background, matching what [`DiscBackend`] predicts
pub fn subject_image(size: u32) -> RgbImage {
    let center = size as f32 / 2.0;
    let radius = size as f32 * SUBJECT_RADIUS;
    RgbImage::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        if (dx * dx + dy * dy).sqrt() <= radius {
            Rgb([220, 40, 30])
        } else {
            Rgb([20, 60, 200])
        }
    })
}

/// Encode an image in the given container format
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).expect("encode test image");
    buffer.into_inner()
}

/// [`subject_image`] encoded as PNG
pub fn subject_png(size: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(subject_image(size)), ImageFormat::Png)
}

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
