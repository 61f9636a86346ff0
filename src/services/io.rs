//! Image source resolution
//!
//! Everything the pipeline processes arrives as an [`ImageSource`] and is
//! turned into bytes exactly once, before the first stage runs.

use crate::{
    error::{BgRemovalError, Result},
    types::ImageBytes,
    utils::InputValidator,
};
use std::path::{Path, PathBuf};

/// Demo images tried in order when nothing was uploaded
pub const DEFAULT_IMAGES: [&str; 2] = ["zebra.jpg", "wallaby.png"];

/// Where the bytes for a request come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Image on local disk (the default-image fallback)
    FilePath(PathBuf),
    /// Uploaded bytes with the client's file name, if one was sent
    InMemory {
        file_name: Option<String>,
        data: Vec<u8>,
    },
}

impl ImageSource {
    /// Uploaded bytes
    #[must_use]
    pub fn upload(file_name: Option<String>, data: Vec<u8>) -> Self {
        Self::InMemory { file_name, data }
    }

    /// Human-readable name for logs
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::FilePath(path) => path.display().to_string(),
            Self::InMemory { file_name, data } => file_name
                .clone()
                .unwrap_or_else(|| format!("<upload of {} bytes>", data.len())),
        }
    }

    /// Read the source into bytes.
    ///
    /// Uploads must declare a file name with an accepted extension; the
    /// format tag comes from that extension and is confirmed again when
    /// decoding.
    ///
    /// # Errors
    /// - [`BgRemovalError::UnsupportedFormat`] for an upload with no file name or a rejected extension
    /// - [`BgRemovalError::MissingDefaultImage`] if a file path no longer exists
    /// - [`BgRemovalError::Io`] for other read failures
    pub fn resolve(self) -> Result<ImageBytes> {
        match self {
            Self::FilePath(path) => {
                let data = std::fs::read(&path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        BgRemovalError::MissingDefaultImage {
                            searched: vec![path.clone()],
                        }
                    } else {
                        BgRemovalError::file_io_error("read image", &path, &e)
                    }
                })?;
                let bytes = ImageBytes::new(data);
                Ok(match image::ImageFormat::from_path(&path) {
                    Ok(format) => bytes.with_format(format),
                    Err(_) => bytes,
                })
            },
            Self::InMemory { file_name, data } => {
                let name = file_name
                    .ok_or_else(|| BgRemovalError::unsupported_format("no file name"))?;
                let format = InputValidator::validate_extension(&name)?;
                Ok(ImageBytes::new(data).with_format(format))
            },
        }
    }
}

/// First default image that exists under `asset_dir`
///
/// # Errors
/// Returns [`BgRemovalError::MissingDefaultImage`] listing every path tried
pub fn find_default_image(asset_dir: &Path) -> Result<PathBuf> {
    let candidates: Vec<PathBuf> = DEFAULT_IMAGES
        .iter()
        .map(|name| asset_dir.join(name))
        .collect();

    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or(BgRemovalError::MissingDefaultImage {
            searched: candidates,
        })
}

/// [`ImageSource`] for the default-image fallback
///
/// # Errors
/// Returns [`BgRemovalError::MissingDefaultImage`] when no default image exists
pub fn default_source(asset_dir: &Path) -> Result<ImageSource> {
    let path = find_default_image(asset_dir)?;
    tracing::debug!(path = %path.display(), "Using default image");
    Ok(ImageSource::FilePath(path))
}
