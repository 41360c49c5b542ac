//! Pretrained model registry and model management

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Release page hosting the pretrained segmentation weights
pub const MODEL_BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// ImageNet channel statistics shared by the U2-Net family
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pretrained salient-object segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PretrainedModel {
    /// General purpose U2-Net (~170 MB)
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight U2-Net (~4 MB)
    #[serde(rename = "u2netp")]
    U2NetP,
    /// U2-Net trained for human segmentation
    #[serde(rename = "u2net_human_seg")]
    U2NetHumanSeg,
    /// Pruned U2-Net with the same quality at a fraction of the size
    #[serde(rename = "silueta")]
    Silueta,
    /// High-fidelity `ISNet` general-use model
    #[default]
    #[serde(rename = "isnet-general-use")]
    IsNetGeneralUse,
}

impl PretrainedModel {
    /// Every known model, in listing order
    pub const ALL: [Self; 5] = [
        Self::U2Net,
        Self::U2NetP,
        Self::U2NetHumanSeg,
        Self::Silueta,
        Self::IsNetGeneralUse,
    ];

    /// Canonical model name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::Silueta => "silueta",
            Self::IsNetGeneralUse => "isnet-general-use",
        }
    }

    /// File name of the weights inside the cache directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    /// Download URL of the weights
    #[must_use]
    pub fn url(self) -> String {
        format!("{MODEL_BASE_URL}/{}", self.file_name())
    }

    /// Short human readable description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::U2Net => "general purpose salient object segmentation",
            Self::U2NetP => "lightweight general purpose segmentation",
            Self::U2NetHumanSeg => "human segmentation",
            Self::Silueta => "reduced-size u2net",
            Self::IsNetGeneralUse => "high-fidelity general purpose segmentation",
        }
    }

    /// Input normalization expected by this model
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::U2Net | Self::U2NetP | Self::U2NetHumanSeg | Self::Silueta => {
                PreprocessingConfig::u2net()
            },
            Self::IsNetGeneralUse => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }
}

impl std::fmt::Display for PretrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PretrainedModel {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
                BgRemovalError::invalid_config(format!(
                    "Unknown model '{s}'. Available models: {}",
                    known.join(", ")
                ))
            })
    }
}

/// Image normalization applied before inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square model input size (width, height)
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// 320x320 input with ImageNet statistics
    #[must_use]
    pub fn u2net() -> Self {
        Self {
            target_size: [320, 320],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }
}

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Named pretrained model resolved through the weight cache
    Pretrained(PretrainedModel),
    /// Local ONNX file
    External(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::Pretrained(model) => model.name().to_string(),
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
        }
    }
}

/// Complete model specification
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Pretrained(PretrainedModel::default())
    }
}

impl ModelSpec {
    /// Spec for a named pretrained model
    #[must_use]
    pub fn pretrained(model: PretrainedModel) -> Self {
        Self {
            source: ModelSource::Pretrained(model),
        }
    }

    /// Spec for a local ONNX file
    #[must_use]
    pub fn external<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: ModelSource::External(path.into()),
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
}

/// Model manager resolving a spec to a weight file on disk
#[derive(Debug, Clone)]
pub struct ModelManager {
    name: String,
    path: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Create a model manager from a model specification
    ///
    /// Pretrained models are looked up in the default weight cache.
    ///
    /// # Errors
    /// - Cache directory cannot be determined or created
    /// - Model file not present
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        match &spec.source {
            ModelSource::Pretrained(model) => {
                let cache = ModelCache::new()?;
                Self::from_cache(*model, &cache)
            },
            ModelSource::External(path) => Self::with_external_model(path),
        }
    }

    /// Create a model manager for a pretrained model stored in `cache`
    ///
    /// # Errors
    /// - Model not downloaded yet
    pub fn from_cache(model: PretrainedModel, cache: &ModelCache) -> Result<Self> {
        let path = cache.model_path(model);
        if !cache.is_cached(model) {
            return Err(BgRemovalError::model(format!(
                "Model '{model}' not found at '{}'",
                path.display()
            )));
        }

        Ok(Self {
            name: model.name().to_string(),
            path,
            preprocessing: model.preprocessing(),
        })
    }

    /// Create model manager for a local ONNX file
    ///
    /// External files get the 320x320 U2-Net normalization.
    ///
    /// # Errors
    /// - Path does not exist or is not a regular file
    pub fn with_external_model<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.is_file() {
            return Err(BgRemovalError::model(format!(
                "Model file does not exist: {}",
                path.display()
            )));
        }

        Ok(Self {
            name: ModelSource::External(path.to_path_buf()).display_name(),
            path: path.to_path_buf(),
            preprocessing: PreprocessingConfig::u2net(),
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    /// - Empty model file
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.path)
            .map_err(|e| BgRemovalError::file_io_error("read model file", &self.path, &e))?;

        if data.is_empty() {
            return Err(BgRemovalError::model(format!(
                "Model file is empty: {}",
                self.path.display()
            )));
        }

        Ok(data)
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.path)
            .map_err(|e| BgRemovalError::file_io_error("inspect model file", &self.path, &e))?
            .len();
        let [width, height] = self.preprocessing.target_size;

        Ok(ModelInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
        })
    }

    /// Get preprocessing configuration
    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing.clone()
    }

    /// Model display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the model file path
    #[must_use]
    pub fn get_model_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_model_names_roundtrip() {
        for model in PretrainedModel::ALL {
            assert_eq!(model.name().parse::<PretrainedModel>().unwrap(), model);
        }
        assert_eq!(PretrainedModel::default(), PretrainedModel::IsNetGeneralUse);
    }

    #[test]
    fn test_unknown_model_lists_alternatives() {
        let err = "birefnet".parse::<PretrainedModel>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("birefnet"));
        assert!(message.contains("u2net"));
        assert!(message.contains("isnet-general-use"));
    }

    #[test]
    fn test_model_urls() {
        assert_eq!(
            PretrainedModel::U2Net.url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx"
        );
        assert_eq!(
            PretrainedModel::IsNetGeneralUse.file_name(),
            "isnet-general-use.onnx"
        );
    }

    #[test]
    fn test_preprocessing_per_model() {
        let isnet = PretrainedModel::IsNetGeneralUse.preprocessing();
        assert_eq!(isnet.target_size, [1024, 1024]);
        assert_eq!(isnet.normalization_mean, [0.5, 0.5, 0.5]);
        assert_eq!(isnet.normalization_std, [1.0, 1.0, 1.0]);

        for model in [
            PretrainedModel::U2Net,
            PretrainedModel::U2NetP,
            PretrainedModel::U2NetHumanSeg,
            PretrainedModel::Silueta,
        ] {
            let config = model.preprocessing();
            assert_eq!(config.target_size, [320, 320]);
            assert_eq!(config.normalization_mean, [0.485, 0.456, 0.406]);
            assert_eq!(config.normalization_std, [0.229, 0.224, 0.225]);
        }
    }

    #[test]
    fn test_model_source_display_name() {
        let source = ModelSource::Pretrained(PretrainedModel::U2NetP);
        assert_eq!(source.display_name(), "u2netp");

        let source = ModelSource::External(PathBuf::from("/models/custom.onnx"));
        assert_eq!(source.display_name(), "external:custom.onnx");
    }

    #[test]
    fn test_model_spec_serde_uses_canonical_names() {
        let spec = ModelSpec::pretrained(PretrainedModel::U2NetHumanSeg);
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("u2net_human_seg"));
        let back: ModelSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_external_model_manager() {
        let mut file = tempfile::Builder::new().suffix(".onnx").tempfile().unwrap();
        file.write_all(b"not really onnx").unwrap();

        let manager = ModelManager::with_external_model(file.path()).unwrap();
        assert_eq!(manager.get_preprocessing_config(), PreprocessingConfig::u2net());
        assert_eq!(manager.load_model().unwrap(), b"not really onnx");

        let info = manager.get_info().unwrap();
        assert_eq!(info.size_bytes, 15);
        assert_eq!(info.input_shape, (1, 3, 320, 320));
        assert!(manager.name().starts_with("external:"));
    }

    #[test]
    fn test_external_model_missing() {
        let result = ModelManager::with_external_model("/definitely/not/here.onnx");
        assert!(matches!(result, Err(BgRemovalError::Model(_))));
    }

    #[test]
    fn test_cached_model_manager() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path()).unwrap();

        let missing = ModelManager::from_cache(PretrainedModel::U2NetP, &cache);
        assert!(missing.is_err());

        fs::write(cache.model_path(PretrainedModel::U2NetP), b"weights").unwrap();
        let manager = ModelManager::from_cache(PretrainedModel::U2NetP, &cache).unwrap();
        assert_eq!(manager.name(), "u2netp");
        assert_eq!(manager.get_model_path(), dir.path().join("u2netp.onnx"));
    }

    #[test]
    fn test_empty_model_file_rejected() {
        let file = tempfile::Builder::new().suffix(".onnx").tempfile().unwrap();
        let manager = ModelManager::with_external_model(file.path()).unwrap();
        assert!(matches!(manager.load_model(), Err(BgRemovalError::Model(_))));
    }
}
