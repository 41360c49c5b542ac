#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Invoker
//!
//! Removes the background from a single image using pretrained U2-Net family
//! segmentation models, with optional closed-form alpha matting to refine
//! soft edges. The library runs the whole pipeline; the `bgremove-invoker`
//! binary wraps it as a stdin-to-stdout filter.
//!
//! ## Pipeline
//!
//! 1. Resolve the model file (downloading it into `$U2NET_HOME` if needed)
//!    and create an inference session.
//! 2. Decode the input, detecting the format from content.
//! 3. Normalize to the model's input tensor and run inference.
//! 4. Min-max normalize the prediction into a mask at the original size,
//!    then smooth and binarize it.
//! 5. Composite the cutout, either by plain masking or by alpha matting.
//! 6. Encode as PNG or lossless WebP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_invoker::{remove_background_from_bytes, InvokerConfig, OutputFormat};
//!
//! # fn example(input: Vec<u8>) -> anyhow::Result<()> {
//! let config = InvokerConfig::builder().alpha_matting(true).build()?;
//! let result = remove_background_from_bytes(&input, &config)?;
//! let png = result.to_bytes(OutputFormat::Png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA/CoreML providers
//! - `tract`: pure Rust backend
//! - `cli` (default): command-line front end
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log lines

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod cutout;
pub mod download;
pub mod error;
pub mod inference;
pub mod invoker;
pub mod matting;
pub mod models;
pub mod processor;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::*;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{AlphaMattingOptions, ExecutionProvider, InvokerConfig, InvokerConfigBuilder, OutputFormat};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{BgRemovalError, ErrorKind, Result};
pub use inference::InferenceBackend;
pub use invoker::{invoke, InvocationFailure, InvocationReport, InvocationStage};
pub use matting::{alpha_matting_cutout, MattingError};
pub use models::{ModelManager, ModelSource, ModelSpec, PreprocessingConfig, PretrainedModel};
pub use processor::{BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory};
pub use services::{ImageIOService, OutputFormatHandler};
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;

/// Remove the background from encoded image bytes
///
/// Creates a processor for `config`, loads the model and processes one
/// image. The model file must already be present; see
/// [`ModelDownloader::ensure_model`].
///
/// # Errors
/// - Invalid configuration
/// - Model missing or failing to load
/// - Empty, unrecognized or corrupt input
/// - Inference or matting failures
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &InvokerConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_external_model_is_model_error() {
        let config = InvokerConfig::builder()
            .model(ModelSpec::external("/nonexistent/dir/model.onnx"))
            .build()
            .unwrap();
        let err = remove_background_from_bytes(b"irrelevant", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Model);
    }
}
