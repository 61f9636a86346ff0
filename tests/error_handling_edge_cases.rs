//! Error handling and edge case testing
//!
//! Boundary conditions around the upload cap, degenerate image shapes,
//! configuration validation and runtime probing.

use bgremove_studio::{
    backends::test_utils::MockRemover,
    config::{BackendPreference, StudioConfig},
    error::{BgRemovalError, Result},
    models::{ModelPreset, ModelSpec},
    services::{ImageSource, NoOpObserver, RecordingObserver, StageEvent},
    types::ImageBytes,
    utils::{InputValidator, Resizer},
    BackgroundRemovalPipeline, ModelDownloader, RemoverProvider,
};
use image::{DynamicImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([12, 34, 56])))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn test_upload_cap_is_inclusive() -> Result<()> {
    let bytes = png(10, 10);
    let len = bytes.len() as u64;

    let exact = StudioConfig::builder().max_file_size(len).build()?;
    let pipeline = BackgroundRemovalPipeline::new(&exact, Arc::new(MockRemover::new()));
    assert!(pipeline.run(&ImageBytes::new(bytes.clone()), &NoOpObserver).is_ok());

    let one_less = StudioConfig::builder().max_file_size(len - 1).build()?;
    let pipeline = BackgroundRemovalPipeline::new(&one_less, Arc::new(MockRemover::new()));
    let err = pipeline
        .run(&ImageBytes::new(bytes), &NoOpObserver)
        .unwrap_err();
    assert!(matches!(err, BgRemovalError::Oversize { actual, .. } if actual == len));
    Ok(())
}

#[test]
fn test_eleven_megabyte_upload_is_rejected() {
    let remover = Arc::new(MockRemover::new());
    let pipeline = BackgroundRemovalPipeline::new(&StudioConfig::default(), remover.clone());

    let err = pipeline
        .run(&ImageBytes::new(vec![0; 11 * 1024 * 1024]), &NoOpObserver)
        .unwrap_err();

    assert!(matches!(err, BgRemovalError::Oversize { .. }));
    assert!(err.user_message().contains("10.0MB"));
    assert_eq!(remover.call_count(), 0);
}

#[test]
fn test_default_cap_boundaries() {
    let validator = InputValidator::default();
    assert!(validator.validate_size(10 * 1024 * 1024).is_ok());
    assert!(validator.validate_size(10 * 1024 * 1024 + 1).is_err());
    assert!(validator.validate_size(0).is_ok());
}

#[test]
fn test_empty_upload_fails_decoding() {
    let remover = Arc::new(MockRemover::new());
    let pipeline = BackgroundRemovalPipeline::new(&StudioConfig::default(), remover.clone());

    let err = pipeline.run(&ImageBytes::new(Vec::new()), &NoOpObserver).unwrap_err();
    assert!(matches!(err, BgRemovalError::Decode(_)));
    assert_eq!(remover.call_count(), 0);
}

#[test]
fn test_one_pixel_wide_strip() -> Result<()> {
    let pipeline =
        BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(MockRemover::new()));

    let output = pipeline.run(&ImageBytes::new(png(1, 5000)), &NoOpObserver)?;
    assert_eq!(output.original.dimensions(), (1, 2000));

    let output = pipeline.run(&ImageBytes::new(png(6000, 2)), &NoOpObserver)?;
    assert_eq!(output.original.dimensions(), (2000, 1));
    Ok(())
}

#[test]
fn test_target_dimensions_edge_cases() {
    assert_eq!(Resizer::target_dimensions(2000, 2000, 2000), None);
    assert_eq!(Resizer::target_dimensions(2001, 2000, 2000), Some((2000, 1999)));
    assert_eq!(Resizer::target_dimensions(3000, 1000, 2000), Some((2000, 667)));
    assert_eq!(Resizer::target_dimensions(10_000, 1, 2000), Some((2000, 1)));
}

#[test]
fn test_grayscale_input_gains_alpha() -> Result<()> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(image::GrayImage::from_pixel(20, 10, Luma([128])))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();

    let pipeline =
        BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(MockRemover::new()));
    let output = pipeline.run(&ImageBytes::new(buf), &NoOpObserver)?;

    assert!(output.processed.has_alpha());
    let decoded = Resizer::decode(output.download.as_slice())?;
    assert!(decoded.has_alpha());
    Ok(())
}

#[test]
fn test_extension_checks_are_case_insensitive() {
    assert_eq!(
        InputValidator::validate_extension("HOLIDAY.JPEG").unwrap(),
        ImageFormat::Jpeg
    );
    assert_eq!(InputValidator::validate_extension("a.b.Png").unwrap(), ImageFormat::Png);
    assert!(matches!(
        InputValidator::validate_extension("no_extension"),
        Err(BgRemovalError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        InputValidator::validate_extension("clip.webp"),
        Err(BgRemovalError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_file_path_source() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("zebra.jpg");
    let observer = RecordingObserver::new();
    let pipeline =
        BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(MockRemover::new()));

    let err = pipeline
        .run_source(ImageSource::FilePath(missing.clone()), &observer)
        .unwrap_err();

    assert!(matches!(
        err,
        BgRemovalError::MissingDefaultImage { ref searched } if searched == &vec![missing]
    ));
    assert!(observer.events().is_empty());
}

#[test]
fn test_failed_stage_is_reported_once() {
    let observer = RecordingObserver::new();
    let pipeline =
        BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(MockRemover::new()));
    let _ = pipeline.run(&ImageBytes::new(b"garbage".to_vec()), &observer);

    let failures = observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, StageEvent::Failed { .. }))
        .count();
    assert_eq!(failures, 1);
}

#[test]
fn test_config_validation_edge_cases() {
    assert!(StudioConfig::builder().max_dimension(0).build().is_err());
    assert!(StudioConfig::builder().max_file_size(0).build().is_err());
    assert!(StudioConfig::builder().bind_address("  ").build().is_err());
    assert!(StudioConfig::builder().max_dimension(1).build().is_ok());

    let err = StudioConfig::from_json_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, BgRemovalError::Io(_)));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        StudioConfig::from_json_file(&path),
        Err(BgRemovalError::InvalidConfig(_))
    ));
}

#[test]
fn test_probe_requires_model_file() {
    let dir = TempDir::new().unwrap();
    let config = StudioConfig::default();

    let err = RemoverProvider::probe(&config.remover, &dir.path().join("u2net.onnx")).err().unwrap();
    assert!(matches!(err, BgRemovalError::Model(_)));
}

#[cfg(not(feature = "tract"))]
#[test]
fn test_probe_rejects_runtime_not_compiled_in() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("model.onnx");
    std::fs::write(&model, b"onnx").unwrap();

    let mut config = StudioConfig::default();
    config.remover.backend = BackendPreference::Tract;
    assert!(matches!(
        RemoverProvider::probe(&config.remover, &model),
        Err(BgRemovalError::InvalidConfig(_))
    ));
}

#[cfg(feature = "tract")]
#[test]
fn test_tract_probe_defers_model_loading() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("model.onnx");
    std::fs::write(&model, b"not really onnx").unwrap();

    let mut config = StudioConfig::default();
    config.remover.backend = BackendPreference::Tract;
    let remover = RemoverProvider::probe(&config.remover, &model).unwrap();
    assert_eq!(remover.name(), "segmentation-tract");

    // The broken model only surfaces on the first request
    let pipeline = BackgroundRemovalPipeline::new(&StudioConfig::default(), remover);
    let err = pipeline.run(&ImageBytes::new(png(8, 8)), &NoOpObserver).unwrap_err();
    assert!(matches!(err, BgRemovalError::Processing(_)));
}

#[tokio::test]
async fn test_cached_preset_needs_no_network() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(ModelPreset::IsNetGeneral.file_name()), b"cached").unwrap();

    let downloader = ModelDownloader::new(Some(dir.path())).unwrap();
    let path = downloader
        .ensure_model(&ModelSpec::parse("isnet-general"))
        .await
        .unwrap();
    assert_eq!(path, dir.path().join("isnet-general.onnx"));
}
