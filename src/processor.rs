//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns the model session and runs the whole
//! pipeline for one image: preprocess, infer, extract and smooth the mask,
//! then composite the cutout (optionally with alpha matting).

use crate::{
    config::InvokerConfig,
    cutout::{mask_to_rgba, matting_cutout, naive_cutout},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    services::ImageIOService,
    types::{ProcessingTimings, RemovalResult, SegmentationMask},
    utils::{post_process_mask, ImagePreprocessor},
};
use image::DynamicImage;
use instant::Instant;
use ndarray::{s, Array4};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, span, Level};

/// Predictions with a smaller spread than this are treated as constant
const MIN_PREDICTION_RANGE: f32 = f32::EPSILON;

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => f.write_str("onnx"),
            Self::Tract => f.write_str("tract"),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend not compiled into this build
    /// - Backend construction failures
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory for the backends enabled by cargo features
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                let _ = model_manager;
                Err(BgRemovalError::invalid_config(format!(
                    "{other} backend is not compiled into this build (enable the '{other}' feature)"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Runs background removal with a single, exclusively owned model session
pub struct BackgroundRemovalProcessor {
    config: InvokerConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    model_name: Option<String>,
    model_load_ms: u64,
}

impl BackgroundRemovalProcessor {
    /// Create a new processor with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: InvokerConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a new processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: InvokerConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: None,
            model_name: None,
            model_load_ms: 0,
        })
    }

    /// Resolve the model and create the inference session
    ///
    /// Does nothing when already initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Backend unavailable
    /// - Session creation failures
    #[instrument(skip(self), fields(model = %self.config.model.source.display_name(), backend = %self.config.backend_type))]
    pub fn initialize(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }

        let start = Instant::now();
        debug!(provider = %self.config.execution_provider, "Initializing background removal processor");

        let model_manager = ModelManager::from_spec(&self.config.model)?;
        let model_name = model_manager.name().to_string();
        debug!(path = %model_manager.get_model_path().display(), "Resolved model file");

        let mut backend = self
            .backend_factory
            .create_backend(self.config.backend_type, model_manager)?;
        backend.initialize(&self.config)?;

        self.model_load_ms = start.elapsed().as_millis() as u64;
        info!(model = %model_name, load_ms = self.model_load_ms, "Model session ready");

        self.model_name = Some(model_name);
        self.backend = Some(backend);
        Ok(())
    }

    /// Decode image bytes and remove the background
    ///
    /// # Errors
    /// - Empty, unrecognized or corrupt input
    /// - Any error from [`Self::process_image`]
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.initialize()?;

        let decode_start = Instant::now();
        let image = ImageIOService::decode_image(image_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.decode_ms = decode_ms;
        result.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Remove the background from a decoded image
    ///
    /// # Errors
    /// - Model initialization failures
    /// - Inference failures or an unusable output tensor
    /// - Alpha matting failures other than a degenerate trimap
    #[instrument(
        skip(self, image),
        fields(
            model = %self.config.model.source.display_name(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.initialize()?;

        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            model_load_ms: self.model_load_ms,
            ..ProcessingTimings::default()
        };
        let original_dimensions = (image.width(), image.height());
        if original_dimensions.0 == 0 || original_dimensions.1 == 0 {
            return Err(BgRemovalError::decode("Image has zero width or height"));
        }

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            let start = Instant::now();
            let preprocessing = self.backend_mut()?.get_preprocessing_config()?;
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let output_tensor = {
            let _span = span!(Level::DEBUG, "inference").entered();
            let start = Instant::now();
            let output = self.backend_mut()?.infer(&input_tensor)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            output
        };

        let mask = {
            let _span = span!(Level::DEBUG, "mask").entered();
            let start = Instant::now();
            let mut mask = Self::tensor_to_mask(&output_tensor, original_dimensions)?;
            if self.config.post_process_mask {
                mask = SegmentationMask::from_gray_image(&post_process_mask(&mask.to_gray_image()?));
            }
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            mask
        };

        let (result_image, matting_applied) = {
            let _span = span!(Level::DEBUG, "compositing", alpha_matting = self.config.alpha_matting).entered();
            let start = Instant::now();
            let composed = if self.config.only_mask {
                (mask_to_rgba(&mask), false)
            } else if self.config.alpha_matting {
                matting_cutout(image, &mask, &self.config.matting)?
            } else {
                (naive_cutout(image, &mask), false)
            };
            timings.compositing_ms = start.elapsed().as_millis() as u64;
            composed
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            foreground_ratio = mask.foreground_ratio(),
            matting_applied,
            "Processing finished: {}",
            timings.summary()
        );

        Ok(RemovalResult {
            image: result_image,
            mask,
            original_dimensions,
            matting_applied,
            timings,
        })
    }

    /// Convert the raw network output into a mask at the original resolution
    ///
    /// Channel 0 of the first batch item is min-max normalized, scaled to
    /// 0..=255 and resized with Lanczos3. A constant prediction yields an
    /// all-zero mask.
    ///
    /// # Errors
    /// - Output tensor has an empty batch, channel or spatial dimension
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let (batch, channels, height, width) = tensor.dim();
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(BgRemovalError::inference(format!(
                "Invalid output tensor shape {:?}",
                tensor.shape()
            )));
        }

        let prediction = tensor.slice(s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        let data: Vec<u8> = if range.is_finite() && range > MIN_PREDICTION_RANGE {
            prediction
                .iter()
                .map(|&v| (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8)
                .collect()
        } else {
            debug!(min, max, "Constant prediction, mask is empty");
            vec![0; height * width]
        };

        SegmentationMask::new(data, (width as u32, height as u32))
            .resize(original_dimensions.0, original_dimensions.1)
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn InferenceBackend>> {
        self.backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Check if the processor is initialized
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_initialized())
    }

    /// Name of the loaded model, once initialized
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    /// Get available backends from the factory
    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }
}
