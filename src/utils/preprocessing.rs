//! Image preprocessing for segmentation models
//!
//! Turns an image into the normalised NCHW tensor a model expects, and turns
//! the model's prediction back into an 8-bit matte.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use ndarray::{Array4, Axis};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess image for model inference
    ///
    /// The image is converted to RGB and stretched to the model's input size
    /// with Lanczos3; aspect ratio is restored when the matte is scaled back.
    ///
    /// # Errors
    /// - Invalid preprocessing configuration
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        preprocessing_config.validate()?;
        let [width, height] = preprocessing_config.target_size;

        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(&rgb_image, width, height, FilterType::Lanczos3);

        Ok(Self::canvas_to_tensor(&resized, preprocessing_config))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for (channel, ((value, mean), std)) in pixel
                .0
                .iter()
                .zip(preprocessing_config.normalization_mean)
                .zip(preprocessing_config.normalization_std)
                .enumerate()
            {
                if let Some(slot) = tensor.get_mut([0, channel, y, x]) {
                    *slot = (f32::from(*value) / 255.0 - mean) / std;
                }
            }
        }

        tensor
    }

    /// Turn a `[1, 1, H, W]` prediction into an 8-bit matte of `width × height`.
    ///
    /// Values are min-max normalised first; a flat prediction is clamped to
    /// `0..1` instead so an all-foreground mask stays opaque.
    ///
    /// # Errors
    /// - Prediction is empty or does not have a single-channel 4D shape
    pub fn prediction_to_matte(prediction: &Array4<f32>, width: u32, height: u32) -> Result<GrayImage> {
        let shape = prediction.shape();
        let (pred_height, pred_width) = match shape {
            [1, _, h, w] if *h > 0 && *w > 0 => (*h, *w),
            _ => {
                return Err(BgRemovalError::processing(format!(
                    "Unexpected prediction shape {shape:?}"
                )))
            },
        };

        let plane = prediction.index_axis(Axis(0), 0);
        let plane = plane.index_axis(Axis(0), 0);

        let (min, max) = plane
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let range = max - min;

        let mut matte = GrayImage::new(pred_width as u32, pred_height as u32);
        for ((y, x), &value) in plane.indexed_iter() {
            let normalized = if range > f32::EPSILON {
                (value - min) / range
            } else {
                value.clamp(0.0, 1.0)
            };
            matte.put_pixel(x as u32, y as u32, image::Luma([(normalized * 255.0).round() as u8]));
        }

        if matte.dimensions() == (width, height) {
            return Ok(matte);
        }
        Ok(image::imageops::resize(&matte, width, height, FilterType::Lanczos3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelPreset, IMAGENET_MEAN, IMAGENET_STD};
    use image::{ImageBuffer, Rgb};

    fn create_test_preprocessing_config() -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [64, 64],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }

    fn create_test_image() -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(100, 50, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_preprocess_for_inference() {
        let image = create_test_image();
        let config = create_test_preprocessing_config();

        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
    }

    #[test]
    fn test_preset_input_size() {
        let image = create_test_image();
        let config = ModelPreset::U2Net.preprocessing();

        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
    }

    #[test]
    fn test_normalization_values() {
        let image = create_test_image();
        let config = create_test_preprocessing_config();

        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();

        let red = tensor[[0, 0, 32, 32]];
        let green = tensor[[0, 1, 32, 32]];
        assert!((red - (1.0 - 0.485) / 0.229).abs() < 0.05);
        assert!((green - (0.0 - 0.456) / 0.224).abs() < 0.05);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let image = create_test_image();
        let mut config = create_test_preprocessing_config();
        config.target_size = [0, 0];

        assert!(ImagePreprocessor::preprocess_for_inference(&image, &config).is_err());
    }

    #[test]
    fn test_prediction_to_matte_normalizes_range() {
        let mut prediction = Array4::<f32>::from_elem((1, 1, 4, 4), 0.2);
        prediction[[0, 0, 1, 1]] = 0.6;

        let matte = ImagePreprocessor::prediction_to_matte(&prediction, 4, 4).unwrap();

        assert_eq!(matte.get_pixel(0, 0)[0], 0);
        assert_eq!(matte.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_flat_prediction_is_clamped() {
        let prediction = Array4::<f32>::from_elem((1, 1, 8, 8), 1.0);
        let matte = ImagePreprocessor::prediction_to_matte(&prediction, 8, 8).unwrap();
        assert!(matte.pixels().all(|p| p[0] == 255));

        let prediction = Array4::<f32>::zeros((1, 1, 8, 8));
        let matte = ImagePreprocessor::prediction_to_matte(&prediction, 8, 8).unwrap();
        assert!(matte.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_matte_is_scaled_to_image() {
        let prediction = Array4::<f32>::from_elem((1, 1, 16, 16), 1.0);
        let matte = ImagePreprocessor::prediction_to_matte(&prediction, 40, 25).unwrap();
        assert_eq!(matte.dimensions(), (40, 25));
    }

    #[test]
    fn test_prediction_shape_checked() {
        let prediction = Array4::<f32>::zeros((2, 1, 4, 4));
        assert!(ImagePreprocessor::prediction_to_matte(&prediction, 4, 4).is_err());

        let prediction = Array4::<f32>::zeros((1, 1, 0, 4));
        assert!(ImagePreprocessor::prediction_to_matte(&prediction, 4, 4).is_err());
    }
}
