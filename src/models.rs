//! Segmentation model specifications
//!
//! A model is described by where its ONNX file comes from and how images
//! must be prepared before they are fed to it.

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ImageNet channel means used by U²-Net style models
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations used by U²-Net style models
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Tensor preparation parameters for a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input `[width, height]`
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to `0..1`
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided after mean subtraction
    pub normalization_std: [f32; 3],
}

impl PreprocessingConfig {
    /// Reject configurations that would produce an empty tensor or divide by zero
    ///
    /// # Errors
    /// - Zero target width or height
    /// - Zero or non-finite standard deviation
    pub fn validate(&self) -> Result<()> {
        if self.target_size.contains(&0) {
            return Err(BgRemovalError::invalid_config(
                "Model target size must be non-zero",
            ));
        }
        if self
            .normalization_std
            .iter()
            .any(|s| *s == 0.0 || !s.is_finite())
        {
            return Err(BgRemovalError::invalid_config(
                "Normalization standard deviation must be finite and non-zero",
            ));
        }
        Ok(())
    }
}

/// Well-known models with published download locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPreset {
    /// General purpose U²-Net salient object model (320×320 input)
    U2Net,
    /// ISNet general-use model (1024×1024 input)
    IsNetGeneral,
}

impl ModelPreset {
    /// Short name used on the command line and in logs
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::IsNetGeneral => "isnet-general",
        }
    }

    /// Download location of the ONNX file
    #[must_use]
    pub fn url(self) -> &'static str {
        match self {
            Self::U2Net => "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx",
            Self::IsNetGeneral => {
                "https://huggingface.co/imgly/isnet-general-onnx/resolve/main/onnx/model.onnx"
            },
        }
    }

    /// File name inside the model cache
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net.onnx",
            Self::IsNetGeneral => "isnet-general.onnx",
        }
    }

    /// Tensor preparation expected by the model
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::U2Net => PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::IsNetGeneral => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }

    /// Look up a preset by its short name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "u2net" => Some(Self::U2Net),
            "isnet-general" | "isnet-general-use" | "isnet" => Some(Self::IsNetGeneral),
            _ => None,
        }
    }
}

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Built-in preset, downloaded into the cache on first start
    Preset(ModelPreset),
    /// External model from filesystem path
    External(PathBuf),
    /// Arbitrary ONNX file URL, downloaded into the cache on first start
    Url(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::Preset(preset) => format!("preset:{}", preset.name()),
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Url(url) => format!("url:{url}"),
        }
    }
}

/// Complete model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    /// Overrides the preset's tensor preparation (required for non-U²-Net files)
    #[serde(default)]
    pub preprocessing: Option<PreprocessingConfig>,
    /// Expected SHA-256 of the ONNX file, checked after download
    #[serde(default)]
    pub sha256: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Preset(ModelPreset::U2Net),
            preprocessing: None,
            sha256: None,
        }
    }
}

impl ModelSpec {
    /// Parse a command-line model argument.
    ///
    /// Preset names win, then `http(s)://` URLs; anything else is a path.
    #[must_use]
    pub fn parse(arg: &str) -> Self {
        let source = if let Some(preset) = ModelPreset::from_name(arg) {
            ModelSource::Preset(preset)
        } else if arg.starts_with("https://") || arg.starts_with("http://") {
            ModelSource::Url(arg.to_string())
        } else {
            ModelSource::External(PathBuf::from(arg))
        };

        Self {
            source,
            ..Self::default()
        }
    }

    /// Tensor preparation for this model
    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        if let Some(config) = self.preprocessing {
            return config;
        }
        match &self.source {
            ModelSource::Preset(preset) => preset.preprocessing(),
            ModelSource::External(_) | ModelSource::Url(_) => ModelPreset::U2Net.preprocessing(),
        }
    }
}
