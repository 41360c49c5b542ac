//! Configuration types for background removal invocations

use crate::error::{BgRemovalError, Result};
use crate::models::ModelSpec;
use crate::processor::BackendType;
use serde::{Deserialize, Serialize};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Output image format options
///
/// Both formats carry an alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Trimap coefficients used when alpha matting is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMattingOptions {
    /// Mask values strictly above this are definite foreground
    pub foreground_threshold: u8,
    /// Mask values strictly below this are definite background
    pub background_threshold: u8,
    /// Side of the square structuring element used to erode both regions
    pub erode_size: u32,
}

impl Default for AlphaMattingOptions {
    fn default() -> Self {
        Self {
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

impl AlphaMattingOptions {
    /// Largest accepted erosion size
    pub const MAX_ERODE_SIZE: u32 = 255;

    /// Validate threshold ordering and erosion size
    ///
    /// # Errors
    /// - Background threshold not strictly below the foreground threshold
    /// - Erosion size above [`Self::MAX_ERODE_SIZE`]
    pub fn validate(&self) -> Result<()> {
        if self.background_threshold >= self.foreground_threshold {
            return Err(BgRemovalError::invalid_config(format!(
                "Alpha matting background threshold ({}) must be below the foreground threshold ({})",
                self.background_threshold, self.foreground_threshold
            )));
        }

        if self.erode_size > Self::MAX_ERODE_SIZE {
            return Err(BgRemovalError::config_value_error(
                "alpha matting erode size",
                self.erode_size,
                "0-255",
            ));
        }

        Ok(())
    }
}

/// Configuration for a single background removal invocation
///
/// Built once by the caller (usually the CLI) and handed to the processor.
/// Nothing in the library reads process-wide state to fill these values in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct InvokerConfig {
    /// Which pretrained model (or local file) to load
    pub model: ModelSpec,

    /// Inference engine
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Refine mask edges with closed-form alpha matting
    pub alpha_matting: bool,

    /// Trimap coefficients, used only when `alpha_matting` is set
    pub matting: AlphaMattingOptions,

    /// Smooth and binarize the predicted mask before cutting out
    pub post_process_mask: bool,

    /// Emit the mask itself instead of the cutout
    pub only_mask: bool,

    /// Output encoding
    pub output_format: OutputFormat,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            model: ModelSpec::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            alpha_matting: false,
            matting: AlphaMattingOptions::default(),
            post_process_mask: true,
            only_mask: false,
            output_format: OutputFormat::default(),
            intra_threads: 0,
        }
    }
}

impl InvokerConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgremove_invoker::{InvokerConfig, OutputFormat};
    ///
    /// let config = InvokerConfig::builder()
    ///     .alpha_matting(true)
    ///     .output_format(OutputFormat::WebP)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.alpha_matting);
    /// ```
    #[must_use]
    pub fn builder() -> InvokerConfigBuilder {
        InvokerConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid alpha matting coefficients
    /// - Tract backend combined with a GPU execution provider
    pub fn validate(&self) -> Result<()> {
        self.matting.validate()?;

        if self.backend_type == BackendType::Tract
            && !matches!(self.execution_provider, ExecutionProvider::Cpu | ExecutionProvider::Auto)
        {
            return Err(BgRemovalError::invalid_config(format!(
                "Tract backend only supports CPU execution, got '{}'",
                self.execution_provider
            )));
        }

        Ok(())
    }
}

/// Builder for `InvokerConfig`
#[derive(Debug, Default)]
pub struct InvokerConfigBuilder {
    config: InvokerConfig,
}

impl InvokerConfigBuilder {
    /// Set the model specification
    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = model;
        self
    }

    /// Set the inference backend
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Enable or disable alpha matting
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.config.alpha_matting = enabled;
        self
    }

    /// Set the trimap coefficients
    #[must_use]
    pub fn matting_options(mut self, options: AlphaMattingOptions) -> Self {
        self.config.matting = options;
        self
    }

    /// Enable or disable mask post-processing
    #[must_use]
    pub fn post_process_mask(mut self, enabled: bool) -> Self {
        self.config.post_process_mask = enabled;
        self
    }

    /// Emit the mask instead of the cutout
    #[must_use]
    pub fn only_mask(mut self, only_mask: bool) -> Self {
        self.config.only_mask = only_mask;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Invalid alpha matting coefficients
    /// - Incompatible backend and execution provider
    pub fn build(self) -> Result<InvokerConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
