//! # gemprice Vision
//!
//! Image feature extraction for multimodal price prediction.
//!
//! [`ImageFeatureExtractor`] resizes an image to 224x224, applies the
//! backbone's channel normalization and returns the 2048-wide pooled output
//! of a pre-trained ResNet-50. Extraction never fails: a bad image yields a
//! zero vector, and a missing backbone puts the extractor in degraded mode.
//!
//! ```rust
//! use gemprice_vision::{ExtractorConfig, ImageFeatureExtractor};
//! use image::{DynamicImage, RgbImage};
//!
//! // No weights configured: the extractor starts degraded.
//! let extractor = ImageFeatureExtractor::new(ExtractorConfig::default());
//! assert!(extractor.is_degraded());
//!
//! let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
//! assert_eq!(extractor.extract(&image), vec![0.0; 2048]);
//! ```

pub mod backbone;
pub mod error;
pub mod extractor;
pub mod preprocess;

pub use backbone::{Backbone, ResNet50Backbone};
pub use error::VisionError;
pub use extractor::{ExtractorConfig, ExtractorStatus, ImageFeatureExtractor, ImageSource};
pub use preprocess::{load_image, to_input, Normalization, DEFAULT_IMAGE_SIZE};
