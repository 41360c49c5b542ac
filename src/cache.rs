//! Model weight cache
//!
//! Pretrained weights live as flat `<name>.onnx` files in a single directory.
//! The directory is taken from the `U2NET_HOME` environment variable and
//! falls back to `~/.u2net`, so caches populated by other U2-Net tooling are
//! picked up as-is.

use crate::error::{BgRemovalError, Result};
use crate::models::PretrainedModel;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "U2NET_HOME";

/// Directory name used under the home directory when no override is set
const DEFAULT_CACHE_DIR_NAME: &str = ".u2net";

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Which pretrained model the file belongs to
    pub model: PretrainedModel,
    /// Path to the weight file
    pub path: PathBuf,
    /// Size of the weight file in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager for the resolved cache directory, creating it if needed
    ///
    /// # Errors
    /// - Home directory cannot be determined and `U2NET_HOME` is unset
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::resolve_cache_dir()?)
    }

    /// Create a cache manager for an explicit directory, creating it if needed
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                BgRemovalError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// Resolve the cache directory from the environment without touching the filesystem
    ///
    /// # Errors
    /// - Home directory cannot be determined and `U2NET_HOME` is unset
    pub fn resolve_cache_dir() -> Result<PathBuf> {
        Self::cache_dir_from(std::env::var_os(CACHE_DIR_ENV), dirs::home_dir())
    }

    fn cache_dir_from(env_value: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(value) = env_value.filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(value));
        }

        home.map(|home| home.join(DEFAULT_CACHE_DIR_NAME)).ok_or_else(|| {
            BgRemovalError::invalid_config(format!(
                "Failed to determine home directory. Set the {CACHE_DIR_ENV} environment variable."
            ))
        })
    }

    /// The cache directory
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path where the weights of `model` are (or would be) stored
    #[must_use]
    pub fn model_path(&self, model: PretrainedModel) -> PathBuf {
        self.cache_dir.join(model.file_name())
    }

    /// Check if a model is cached
    ///
    /// A zero-length file counts as missing.
    #[must_use]
    pub fn is_cached(&self, model: PretrainedModel) -> bool {
        fs::metadata(self.model_path(model)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Scan the cache directory and return every known model found in it
    ///
    /// # Errors
    /// - Failed to read cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(model) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".onnx"))
                .and_then(|stem| stem.parse::<PretrainedModel>().ok())
            else {
                continue;
            };

            if let Ok(meta) = entry.metadata() {
                if meta.is_file() && meta.len() > 0 {
                    models.push(CachedModelInfo {
                        model,
                        path,
                        size_bytes: meta.len(),
                    });
                }
            }
        }

        // Sort by model name for consistent output
        models.sort_by(|a, b| a.model.name().cmp(b.model.name()));
        Ok(models)
    }
}

/// Format a byte count for display
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let unit_name = UNITS.get(unit).copied().unwrap_or("B");
    if unit == 0 {
        format!("{bytes} {unit_name}")
    } else {
        format!("{size:.1} {unit_name}")
    }
}
