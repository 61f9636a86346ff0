//! Model download and cache resolution
//!
//! Presets and URL models are fetched once into a per-user cache directory.
//! Downloads stream into a `.part` file, are optionally verified against a
//! SHA-256 digest, and are renamed into place only when complete.

use crate::error::{BgRemovalError, Result};
use crate::models::{ModelSource, ModelSpec};
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Resolves model specifications to local ONNX files
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache_dir: PathBuf,
}

impl ModelDownloader {
    /// Create a downloader caching into `cache_dir`, or the per-user cache when `None`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - No cache directory could be determined
    pub fn new(cache_dir: Option<&Path>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        let cache_dir = match cache_dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_cache_dir()?,
        };

        Ok(Self { client, cache_dir })
    }

    /// `<user cache dir>/bgremove-studio/models`
    ///
    /// # Errors
    /// Returns [`BgRemovalError::InvalidConfig`] when the platform has no cache directory
    pub fn default_cache_dir() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join("bgremove-studio").join("models"))
            .ok_or_else(|| {
                BgRemovalError::invalid_config(
                    "Could not determine a cache directory; pass --cache-dir",
                )
            })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where a downloadable model lives in the cache, `None` for external files
    #[must_use]
    pub fn cached_path(&self, spec: &ModelSpec) -> Option<PathBuf> {
        match &spec.source {
            ModelSource::Preset(preset) => Some(self.cache_dir.join(preset.file_name())),
            ModelSource::Url(url) => Some(self.cache_dir.join(file_name_from_url(url))),
            ModelSource::External(_) => None,
        }
    }

    /// Return a local path for the model, downloading it first if needed
    ///
    /// # Errors
    /// - External model path does not exist
    /// - Network errors during download
    /// - Digest mismatch
    /// - File system errors while caching
    pub async fn ensure_model(&self, spec: &ModelSpec) -> Result<PathBuf> {
        let url = match &spec.source {
            ModelSource::External(path) => {
                if path.is_file() {
                    return Ok(path.clone());
                }
                return Err(BgRemovalError::model(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            },
            ModelSource::Preset(preset) => preset.url().to_string(),
            ModelSource::Url(url) => url.clone(),
        };

        let target = self
            .cached_path(spec)
            .ok_or_else(|| BgRemovalError::internal("Downloadable model has no cache path"))?;

        if target.is_file() {
            tracing::debug!(path = %target.display(), "Model already cached");
            return Ok(target);
        }

        tracing::info!(
            model = %spec.source.display_name(),
            url = %url,
            "Downloading model"
        );

        let partial = target.with_extension("onnx.part");
        let result = self.fetch(&url, &partial, spec.sha256.as_deref()).await;
        if let Err(e) = result {
            if partial.exists() {
                if let Err(cleanup_err) = fs::remove_file(&partial) {
                    tracing::warn!(error = %cleanup_err, "Failed to remove partial download");
                }
            }
            return Err(e);
        }

        fs::rename(&partial, &target)
            .map_err(|e| BgRemovalError::file_io_error("move downloaded model to cache", &target, &e))?;

        tracing::info!(path = %target.display(), "Model cached");
        Ok(target)
    }

    async fn fetch(&self, url: &str, partial: &Path, expected_sha256: Option<&str>) -> Result<()> {
        let size = self.download_file(url, partial).await?;
        tracing::debug!(size = %format_size(size), "Download complete");

        if !Self::verify_file_integrity(partial, expected_sha256)? {
            return Err(BgRemovalError::model(format!(
                "Checksum mismatch for model downloaded from {url}"
            )));
        }
        Ok(())
    }

    /// Stream `url` into `local_path`, returning the number of bytes written
    async fn download_file(&self, url: &str, local_path: &Path) -> Result<u64> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {url}"),
                format!("HTTP {}", response.status()),
            ));
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        Ok(downloaded)
    }

    /// Compare a file's SHA-256 with `expected_hash` (hex, case-insensitive).
    ///
    /// Returns `true` when no hash is given.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read
    pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
        let Some(expected) = expected_hash else {
            return Ok(true);
        };

        let contents = fs::read(file_path).map_err(|e| {
            BgRemovalError::file_io_error("read file for verification", file_path, &e)
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let actual_hash = format!("{:x}", hasher.finalize());

        if actual_hash.eq_ignore_ascii_case(expected.trim()) {
            Ok(true)
        } else {
            tracing::warn!(
                path = %file_path.display(),
                expected,
                actual = %actual_hash,
                "File integrity check failed"
            );
            Ok(false)
        }
    }
}

/// Last path segment of a URL without query or fragment, `model.onnx` if empty
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map_or_else(|| "model.onnx".to_string(), str::to_string)
}

/// Format a byte count for humans
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS.get(unit).copied().unwrap_or("B"))
    }
}
