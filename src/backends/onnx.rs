//! ONNX Runtime backend implementation for segmentation models
//!
//! Runs the pretrained U2-Net / `ISNet` networks through ONNX Runtime with
//! optional CUDA or `CoreML` acceleration.

use crate::config::{ExecutionProvider, InvokerConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use tracing::{debug, info, warn};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        debug!(
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "Probing ONNX Runtime execution providers"
        );

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Resolve the requested provider into the list handed to the session builder
    ///
    /// An empty list means plain CPU execution.
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda_available =
            || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false)
        };

        match requested {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available() {
                    info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    debug!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    info!("Using CUDA execution provider");
                    vec![CUDAExecutionProvider::default().build()]
                } else {
                    warn!("CUDA execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    info!("🍎 Using CoreML execution provider (explicitly requested)");
                    vec![CoreMLExecutionProvider::default().with_subgraphs(true).build()]
                } else {
                    warn!("CoreML execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
        }
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &InvokerConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not set for ONNX backend"))?;

        let model_info = model_manager.get_info()?;
        let model_data = model_manager.load_model()?;

        let mut session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgRemovalError::model(format!("Failed to set optimization level: {e}")))?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    BgRemovalError::model(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!(
                    "Failed to create session from '{}': {e}",
                    model_info.path.display()
                ))
            })?;

        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        debug!(
            model = %model_info.name,
            provider = %config.execution_provider,
            intra_threads,
            "ONNX Runtime session created ({size_mb:.2} MB)"
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InvokerConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs: model input names differ between releases
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional output: the saliency map is always the first graph output
        if outputs.len() == 0 {
            return Err(BgRemovalError::inference("No output tensors found"));
        }
        let output_tensor = outputs[0].try_extract_array::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
        })?;

        let output_shape = output_tensor.shape().to_vec();
        let [batch, channels, height, width] = output_shape.as_slice() else {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };

        let output_data = output_tensor.iter().copied().collect::<Vec<f32>>();
        let result = Array4::from_shape_vec((*batch, *channels, *height, *width), output_data)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to reshape output tensor: {e}"))
            })?;

        debug!(
            "Inference complete: {:.2}ms, output shape {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            result.dim()
        );

        Ok(result)
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
