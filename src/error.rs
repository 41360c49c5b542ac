//! Error types for background removal invocations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Coarse classification of a failure, reported alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Empty, unreadable or undecodable input
    Input,
    /// Model resolution, download or session creation
    Model,
    /// Running the network or interpreting its output
    Inference,
    /// Encoding or writing the result
    Output,
    /// Invalid configuration or arguments
    Config,
    /// Unexpected internal condition
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Model => "model",
            Self::Inference => "inference",
            Self::Output => "output",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error types for background removal operations
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Nothing was received on the input stream
    #[error("No image data received")]
    EmptyInput,

    /// Input/output errors (file not found, broken pipe, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Unsupported or unrecognized format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Mask, matting or compositing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Output encoding errors
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new encoding error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a network error wrapping the underlying cause
    pub fn network_error<S, E>(msg: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Network {
            message: msg.into(),
            source: source.into(),
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create config value error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }

    /// Classify this error for reporting
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput | Self::Decode(_) | Self::UnsupportedFormat(_) => ErrorKind::Input,
            Self::Io(_) | Self::Encode(_) => ErrorKind::Output,
            Self::Model(_) | Self::Network { .. } => ErrorKind::Model,
            Self::Inference(_) | Self::Processing(_) => ErrorKind::Inference,
            Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BgRemovalError::invalid_config("test config error");
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));

        let err = BgRemovalError::unsupported_format("TGA");
        assert!(matches!(err, BgRemovalError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::EmptyInput;
        assert_eq!(err.to_string(), "No image data received");

        let err = BgRemovalError::model("weights missing");
        assert_eq!(err.to_string(), "Model error: weights missing");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(BgRemovalError::EmptyInput.kind(), ErrorKind::Input);
        assert_eq!(BgRemovalError::decode("bad").kind(), ErrorKind::Input);
        assert_eq!(BgRemovalError::model("oom").kind(), ErrorKind::Model);
        assert_eq!(
            BgRemovalError::network_error("down", std::io::Error::other("x")).kind(),
            ErrorKind::Model
        );
        assert_eq!(BgRemovalError::inference("shape").kind(), ErrorKind::Inference);
        assert_eq!(BgRemovalError::encode("png").kind(), ErrorKind::Output);
        assert_eq!(BgRemovalError::invalid_config("x").kind(), ErrorKind::Config);
        assert_eq!(BgRemovalError::internal("x").kind(), ErrorKind::Internal);
        assert_eq!(ErrorKind::Model.to_string(), "model");
    }

    #[test]
    fn test_file_io_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgRemovalError::file_io_error("read model", Path::new("/tmp/u2net.onnx"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read model"));
        assert!(error_string.contains("/tmp/u2net.onnx"));
        assert!(error_string.contains("access denied"));
    }

    #[test]
    fn test_config_value_error() {
        let err = BgRemovalError::config_value_error("erode size", 999, "0-255");
        let error_string = err.to_string();
        assert!(error_string.contains("erode size"));
        assert!(error_string.contains("999"));
        assert!(error_string.contains("0-255"));
    }
}
