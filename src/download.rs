//! Model weight downloading
//!
//! Weights are streamed into a temporary file inside the cache directory and
//! renamed into place once complete, so an interrupted download never leaves
//! a truncated `<name>.onnx` behind.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use crate::models::PretrainedModel;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Read buffer size for the download stream
const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Set message for progress indicator
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    /// Set length for progress indicator
    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    /// Set position for progress indicator
    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    /// Finish progress indicator with message
    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a downloader for the default weight cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader writing into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Return the cached weight file for `model`, downloading it first if missing
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors while writing the cache
    pub async fn ensure_model(&self, model: PretrainedModel, show_progress: bool) -> Result<PathBuf> {
        let path = self.cache.model_path(model);

        if self.cache.is_cached(model) {
            debug!(model = %model, path = %path.display(), "Model already cached");
            return Ok(path);
        }

        self.download_model(model, show_progress).await
    }

    /// Download `model` into the cache, replacing any existing file
    ///
    /// # Errors
    /// - Network errors during download
    /// - Empty response body
    /// - File system errors while writing the cache
    pub async fn download_model(
        &self,
        model: PretrainedModel,
        show_progress: bool,
    ) -> Result<PathBuf> {
        let url = model.url();
        validate_model_url(&url)?;
        info!(model = %model, url = %url, "Downloading model weights");

        let final_path = self.cache.model_path(model);
        let temp_file = tempfile::Builder::new()
            .prefix(&format!(".{}-", model.name()))
            .suffix(".part")
            .tempfile_in(self.cache.cache_dir())
            .map_err(|e| {
                BgRemovalError::file_io_error(
                    "create temporary download file in",
                    self.cache.cache_dir(),
                    &e,
                )
            })?;

        let progress = if show_progress {
            Some(Self::create_progress_indicator())
        } else {
            None
        };
        if let Some(pb) = progress.as_ref() {
            pb.set_message(format!("Downloading {model}"));
        }

        let outcome = self.download_file(&url, &temp_file, progress.as_ref()).await;

        match outcome {
            Ok(bytes) => {
                temp_file.persist(&final_path).map_err(|e| {
                    BgRemovalError::file_io_error("move downloaded model to", &final_path, &e.error)
                })?;

                if let Some(pb) = progress {
                    pb.finish_with_message(format!("✅ Downloaded {model}"));
                }

                info!(
                    model = %model,
                    bytes,
                    path = %final_path.display(),
                    "Model downloaded"
                );
                Ok(final_path)
            },
            Err(e) => {
                // Dropping the temp file removes the partial download
                if let Err(cleanup_err) = temp_file.close() {
                    warn!("Failed to clean up partial download: {}", cleanup_err);
                }

                if let Some(pb) = progress {
                    pb.finish_with_message("❌ Download failed".to_string());
                }

                Err(e)
            },
        }
    }

    /// Create a progress indicator for download reporting
    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Stream `url` into `temp_file`, returning the number of bytes written
    async fn download_file(
        &self,
        url: &str,
        temp_file: &tempfile::NamedTempFile,
        progress: Option<&ProgressIndicator>,
    ) -> Result<u64> {
        let local_path = temp_file.path();
        debug!("Downloading: {} -> {}", url, local_path.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("HTTP error {} for {}", response.status(), url),
                std::io::Error::other("HTTP error"),
            ));
        }

        let total_size = response.content_length();
        if let (Some(pb), Some(total)) = (progress, total_size) {
            pb.set_length(total);
        }

        let std_file = temp_file
            .reopen()
            .map_err(|e| BgRemovalError::file_io_error("open", local_path, &e))?;
        let mut file = tokio::fs::File::from_std(std_file);

        let mut stream = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));

        let mut downloaded = 0u64;
        let mut buffer = vec![0; DOWNLOAD_BUFFER_SIZE];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to", local_path, &e))?;

            downloaded += bytes_read as u64;

            if let Some(pb) = progress {
                if total_size.is_some() {
                    pb.set_position(downloaded);
                } else {
                    pb.set_message(format!(
                        "Downloaded {:.1} MB",
                        downloaded as f64 / (1024.0 * 1024.0)
                    ));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush", local_path, &e))?;
        file.sync_all()
            .await
            .map_err(|e| BgRemovalError::file_io_error("sync", local_path, &e))?;

        if downloaded == 0 {
            return Err(BgRemovalError::network_error(
                format!("Empty response body for {url}"),
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no data"),
            ));
        }

        if let Some(total) = total_size {
            if total != downloaded {
                return Err(BgRemovalError::network_error(
                    format!("Incomplete download for {url}: {downloaded} of {total} bytes"),
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"),
                ));
            }
        }

        Ok(downloaded)
    }
}

/// Validate that a URL can be used to fetch model weights
///
/// Only HTTPS URLs pointing at an `.onnx` file are accepted.
///
/// # Errors
/// - Non-HTTPS scheme
/// - Missing `.onnx` file name
pub fn validate_model_url(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("https://") else {
        return Err(BgRemovalError::invalid_config(format!(
            "Model URL must use HTTPS: {url}"
        )));
    };

    let has_file = rest
        .rsplit_once('/')
        .is_some_and(|(host, file)| !host.is_empty() && file.len() > ".onnx".len() && file.ends_with(".onnx"));
    if !has_file {
        return Err(BgRemovalError::invalid_config(format!(
            "Model URL must point to an .onnx file: {url}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_model_url() {
        for model in PretrainedModel::ALL {
            assert!(validate_model_url(&model.url()).is_ok());
        }

        assert!(validate_model_url("http://example.com/u2net.onnx").is_err());
        assert!(validate_model_url("https://example.com/u2net.bin").is_err());
        assert!(validate_model_url("https://example.com/.onnx").is_err());
        assert!(validate_model_url("https://u2net.onnx").is_err());
        assert!(validate_model_url("").is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path()).unwrap();
        let expected = cache.model_path(PretrainedModel::U2NetP);
        fs::write(&expected, b"cached weights").unwrap();

        let downloader = ModelDownloader::with_cache(cache).unwrap();
        let path = downloader
            .ensure_model(PretrainedModel::U2NetP, false)
            .await
            .unwrap();

        assert_eq!(path, expected);
        assert_eq!(fs::read(&path).unwrap(), b"cached weights");
    }

    #[test]
    fn test_progress_indicator_no_op() {
        let progress = ProgressIndicator::NoOp;

        progress.set_message("Test message".to_string());
        progress.set_length(100);
        progress.set_position(50);
        progress.finish_with_message("Done".to_string());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_progress_indicator_with_indicatif() {
        let pb = ProgressBar::hidden();
        let progress = ProgressIndicator::Indicatif(pb);

        progress.set_length(100);
        progress.set_position(50);
        progress.finish_with_message("Done".to_string());
    }
}
