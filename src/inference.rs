//! Inference backend abstraction

use crate::{config::InvokerConfig, error::Result, models::PreprocessingConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// A loaded segmentation model session
///
/// Implementations own their session exclusively; a session is created once
/// by [`InferenceBackend::initialize`] and released when the backend is dropped.
pub trait InferenceBackend {
    /// Load the model and create the session
    ///
    /// Returns the model load time, or `None` if the backend was already initialized.
    ///
    /// # Errors
    /// - Model file unreadable or not a valid network
    /// - Session creation failures (including resource exhaustion)
    fn initialize(&mut self, config: &InvokerConfig) -> Result<Option<Duration>>;

    /// Run inference on a `1x3xHxW` input tensor
    ///
    /// Returns the first model output as `1xCxHxW`; channel 0 holds the saliency prediction.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output tensor not four-dimensional
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get preprocessing configuration for the loaded model
    ///
    /// # Errors
    /// - Model manager not set
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
