//! Tract backend implementation for segmentation models
//!
//! Pure Rust inference with no native runtime, CPU only.

use crate::config::InvokerConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// List Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(BgRemovalError::internal(
                "No model manager available for Tract backend",
            ));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let (batch, channels, height, width) = model_info.input_shape;

        info!(model = %model_info.name, "Initializing Tract backend");

        // Pin the input shape so the graph can be fully optimized
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &InvokerConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Tract model not initialized"))?;

        debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_array = output_data
            .to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|_| {
                BgRemovalError::inference(format!(
                    "Expected 4D output tensor, got {}D",
                    output_data.ndim()
                ))
            })?;

        debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not initialized"))?;
        Ok(model_manager.get_preprocessing_config())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
