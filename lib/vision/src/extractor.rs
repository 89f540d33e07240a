//! Image Feature Extractor
//!
//! Wraps a [`Backbone`] behind a contract that never fails: any per-image
//! read, decode or inference error is logged and replaced by a zero
//! embedding, and a backbone that could not be loaded puts the extractor in
//! an explicit degraded mode where every call returns zeros.

use candle_core::Device;
use gemprice_core::{Embedding, ImageEmbedder, EMBEDDING_DIM};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backbone::{Backbone, ResNet50Backbone};
use crate::error::VisionError;
use crate::preprocess::{load_image, to_input, Normalization, DEFAULT_IMAGE_SIZE};

/// Extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractorConfig {
    /// Safetensors file holding the ResNet-50 weights
    pub weights: Option<PathBuf>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

fn default_output_dim() -> usize {
    EMBEDDING_DIM
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            weights: None,
            image_size: DEFAULT_IMAGE_SIZE,
            normalization: Normalization::default(),
            output_dim: EMBEDDING_DIM,
        }
    }
}

/// Whether the extractor can produce real embeddings
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ExtractorStatus {
    Ready { backbone: String },
    Degraded { reason: String },
}

/// An image given either by location or already decoded
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    Image(&'a DynamicImage),
}

impl<'a> From<&'a Path> for ImageSource<'a> {
    fn from(path: &'a Path) -> Self {
        ImageSource::Path(path)
    }
}

impl<'a> From<&'a DynamicImage> for ImageSource<'a> {
    fn from(image: &'a DynamicImage) -> Self {
        ImageSource::Image(image)
    }
}

pub struct ImageFeatureExtractor {
    backbone: Option<Box<dyn Backbone>>,
    config: ExtractorConfig,
    status: ExtractorStatus,
    failures: AtomicU64,
}

impl std::fmt::Debug for ImageFeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFeatureExtractor")
            .field("config", &self.config)
            .field("status", &self.status)
            .field("failures", &self.failures())
            .finish()
    }
}

impl ImageFeatureExtractor {
    /// Load the ResNet-50 backbone named by `config`, degrading if it is unavailable
    pub fn new(config: ExtractorConfig) -> Self {
        let loaded = match &config.weights {
            Some(path) => ResNet50Backbone::load(path, Device::Cpu),
            None => Err(VisionError::Unavailable("no backbone weights configured".to_string())),
        };

        match loaded {
            Ok(backbone) => Self::with_backbone(config, Box::new(backbone)),
            Err(e) => Self::degraded(config, e.to_string()),
        }
    }

    /// Wrap `backbone`; degrades when the configured normalization is not
    /// the one the backbone's weights expect
    pub fn with_backbone(config: ExtractorConfig, backbone: Box<dyn Backbone>) -> Self {
        if let Some(expected) = backbone.normalization() {
            if expected != config.normalization {
                let reason = format!(
                    "{} weights expect {} normalization, configured {}",
                    backbone.name(),
                    expected,
                    config.normalization
                );
                return Self::degraded(config, reason);
            }
        }
        if backbone.output_dim() != config.output_dim {
            tracing::warn!(
                backbone = backbone.name(),
                backbone_dim = backbone.output_dim(),
                expected = config.output_dim,
                "backbone width differs from configured embedding width; extractions will fall back to zeros"
            );
        }
        let status = ExtractorStatus::Ready {
            backbone: backbone.name().to_string(),
        };
        Self {
            backbone: Some(backbone),
            config,
            status,
            failures: AtomicU64::new(0),
        }
    }

    /// An extractor that returns zero embeddings for every image
    pub fn degraded(config: ExtractorConfig, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(%reason, "image feature extractor running in degraded mode, all embeddings will be zero");
        Self {
            backbone: None,
            config,
            status: ExtractorStatus::Degraded { reason },
            failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn status(&self) -> &ExtractorStatus {
        &self.status
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ExtractorStatus::Degraded { .. })
    }

    /// Number of images replaced by a zero embedding after a failure
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Embed one image; returns zeros on any failure
    pub fn extract<'a>(&self, source: impl Into<ImageSource<'a>>) -> Embedding {
        let source = source.into();
        if self.backbone.is_none() {
            tracing::debug!("degraded mode, returning zero embedding");
            return self.zeros();
        }

        match self.try_extract(source) {
            Ok(embedding) => embedding,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                match source {
                    ImageSource::Path(path) => {
                        tracing::warn!(path = %path.display(), error = %e, "image extraction failed, returning zeros")
                    }
                    ImageSource::Image(_) => {
                        tracing::warn!(error = %e, "in-memory image extraction failed, returning zeros")
                    }
                }
                self.zeros()
            }
        }
    }

    /// Embed several images; a failed image never affects the others
    pub fn extract_batch(&self, sources: &[ImageSource<'_>]) -> Vec<Embedding> {
        sources.iter().map(|s| self.extract(*s)).collect()
    }

    /// Embed one image, reporting the failure instead of substituting zeros
    pub fn try_extract(&self, source: ImageSource<'_>) -> Result<Embedding, VisionError> {
        let backbone = self
            .backbone
            .as_ref()
            .ok_or_else(|| VisionError::Unavailable("extractor is degraded".to_string()))?;

        let pixels = match source {
            ImageSource::Path(path) => to_input(&load_image(path)?, self.config.image_size, self.config.normalization),
            ImageSource::Image(image) => to_input(image, self.config.image_size, self.config.normalization),
        };

        let size = self.config.image_size as usize;
        let embedding = catch_unwind(AssertUnwindSafe(|| backbone.forward(pixels, size)))
            .map_err(|_| VisionError::Panicked)??;

        if embedding.len() != self.config.output_dim {
            return Err(VisionError::Dimension {
                expected: self.config.output_dim,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    fn zeros(&self) -> Embedding {
        vec![0.0; self.config.output_dim]
    }
}

impl ImageEmbedder for ImageFeatureExtractor {
    fn dim(&self) -> usize {
        self.config.output_dim
    }

    fn embed_path(&self, path: &Path) -> Embedding {
        self.extract(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Returns the mean of each channel repeated across the output
    struct MeanBackbone {
        dim: usize,
    }

    impl Backbone for MeanBackbone {
        fn name(&self) -> &str {
            "mean"
        }

        fn output_dim(&self) -> usize {
            self.dim
        }

        fn forward(&self, pixels: Vec<f32>, size: usize) -> Result<Vec<f32>, VisionError> {
            let plane = size * size;
            let means: Vec<f32> = (0..3)
                .map(|c| pixels[c * plane..(c + 1) * plane].iter().sum::<f32>() / plane as f32)
                .collect();
            Ok((0..self.dim).map(|i| means[i % 3]).collect())
        }
    }

    struct PanickingBackbone;

    impl Backbone for PanickingBackbone {
        fn name(&self) -> &str {
            "panics"
        }

        fn output_dim(&self) -> usize {
            EMBEDDING_DIM
        }

        fn forward(&self, _pixels: Vec<f32>, _size: usize) -> Result<Vec<f32>, VisionError> {
            panic!("kernel exploded")
        }
    }

    fn config() -> ExtractorConfig {
        ExtractorConfig {
            image_size: 8,
            ..Default::default()
        }
    }

    fn extractor() -> ImageFeatureExtractor {
        ImageFeatureExtractor::with_backbone(config(), Box::new(MeanBackbone { dim: EMBEDDING_DIM }))
    }

    fn write_png(dir: &Path) -> PathBuf {
        let path = dir.join("stone.png");
        RgbImage::from_pixel(16, 16, Rgb([120, 130, 140])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_extract_from_path_and_memory_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());
        let image = image::open(&path).unwrap();

        let extractor = extractor();
        let from_path = extractor.extract(path.as_path());
        let from_memory = extractor.extract(&image);

        assert_eq!(from_path.len(), EMBEDDING_DIM);
        assert_eq!(from_path, from_memory);
        assert!(from_path.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn test_corrupt_file_returns_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.jpg");
        std::fs::write(&path, b"\xff\xd8\xff garbage").unwrap();

        let extractor = extractor();
        let embedding = extractor.extract(path.as_path());
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert!(embedding.iter().all(|x| *x == 0.0));
        assert_eq!(extractor.failures(), 1);
    }

    #[test]
    fn test_batch_survives_bad_images() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path());
        let missing = dir.path().join("missing.png");

        let extractor = extractor();
        let out = extractor.extract_batch(&[
            ImageSource::Path(&good),
            ImageSource::Path(&missing),
            ImageSource::Path(&good),
        ]);
        assert_eq!(out.len(), 3);
        assert!(out[0].iter().any(|x| *x != 0.0));
        assert!(out[1].iter().all(|x| *x == 0.0));
        assert_eq!(out[0], out[2]);
    }

    #[test]
    fn test_degraded_mode_is_observable() {
        let extractor = ImageFeatureExtractor::new(ExtractorConfig {
            weights: Some(PathBuf::from("/nonexistent/resnet50.safetensors")),
            ..Default::default()
        });
        assert!(extractor.is_degraded());
        assert!(matches!(extractor.status(), ExtractorStatus::Degraded { reason } if reason.contains("not found")));

        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let embedding = extractor.extract(&image);
        assert_eq!(embedding, vec![0.0; EMBEDDING_DIM]);
        // degraded zeros are not counted as per-image failures
        assert_eq!(extractor.failures(), 0);
    }

    #[test]
    fn test_wrong_width_backbone_returns_zeros() {
        let extractor = ImageFeatureExtractor::with_backbone(config(), Box::new(MeanBackbone { dim: 16 }));
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(matches!(
            extractor.try_extract(ImageSource::Image(&image)),
            Err(VisionError::Dimension { expected: 2048, actual: 16 })
        ));
        assert_eq!(extractor.extract(&image), vec![0.0; EMBEDDING_DIM]);
    }

    #[test]
    fn test_backbone_panic_is_contained() {
        let extractor = ImageFeatureExtractor::with_backbone(config(), Box::new(PanickingBackbone));
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert_eq!(extractor.extract(&image), vec![0.0; EMBEDDING_DIM]);
        assert_eq!(extractor.failures(), 1);
    }

    struct TorchOnlyBackbone;

    impl Backbone for TorchOnlyBackbone {
        fn name(&self) -> &str {
            "torch-only"
        }

        fn output_dim(&self) -> usize {
            EMBEDDING_DIM
        }

        fn forward(&self, _pixels: Vec<f32>, _size: usize) -> Result<Vec<f32>, VisionError> {
            Ok(vec![1.0; EMBEDDING_DIM])
        }

        fn normalization(&self) -> Option<Normalization> {
            Some(Normalization::Torch)
        }
    }

    #[test]
    fn test_default_config_matches_resnet_weights() {
        assert_eq!(ExtractorConfig::default().normalization, ResNet50Backbone::NORMALIZATION);

        let extractor = ImageFeatureExtractor::with_backbone(ExtractorConfig::default(), Box::new(TorchOnlyBackbone));
        assert!(!extractor.is_degraded());
    }

    #[test]
    fn test_normalization_mismatch_degrades() {
        let config = ExtractorConfig {
            normalization: Normalization::Caffe,
            ..config()
        };
        let extractor = ImageFeatureExtractor::with_backbone(config, Box::new(TorchOnlyBackbone));
        assert!(extractor.is_degraded());
        assert!(matches!(
            extractor.status(),
            ExtractorStatus::Degraded { reason } if reason.contains("expect torch normalization, configured caffe")
        ));
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert_eq!(extractor.extract(&image), vec![0.0; EMBEDDING_DIM]);
    }

    #[test]
    fn test_embedder_trait() {
        let extractor = extractor();
        let embedder: &dyn ImageEmbedder = &extractor;
        assert_eq!(embedder.dim(), EMBEDDING_DIM);
        assert_eq!(embedder.embed_path(Path::new("/nonexistent.png")).len(), EMBEDDING_DIM);
    }
}
