//! Image preprocessing for the backbone
//!
//! Images are resized to a square input with nearest-neighbour sampling and
//! laid out channel-first (`[3, size, size]`), normalized the way the
//! backbone's weights expect.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::VisionError;

/// Default square input resolution
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// ImageNet channel means in BGR order, on the 0-255 scale
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

const TORCH_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
const TORCH_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// Channel normalization applied before the forward pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB to BGR, then subtract the ImageNet mean per channel (Keras ResNet-50)
    Caffe,
    /// Scale to [0, 1], then `(x - mean) / std` per RGB channel (torchvision)
    #[default]
    Torch,
}

impl std::fmt::Display for Normalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Normalization::Caffe => "caffe",
            Normalization::Torch => "torch",
        })
    }
}

impl std::str::FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "caffe" => Ok(Normalization::Caffe),
            "torch" => Ok(Normalization::Torch),
            other => Err(format!("unknown normalization '{}', expected caffe or torch", other)),
        }
    }
}

/// Read and decode an image, sniffing the format from its content
pub fn load_image(path: &Path) -> Result<DynamicImage, VisionError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Resize and normalize into a channel-first buffer of `3 * size * size` floats
pub fn to_input(image: &DynamicImage, size: u32, normalization: Normalization) -> Vec<f32> {
    let rgb = image.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let plane = (size as usize) * (size as usize);
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in rgb.pixels().enumerate() {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (r as f32, g as f32, b as f32);
        match normalization {
            Normalization::Caffe => {
                data[i] = b - CAFFE_MEAN_BGR[0];
                data[plane + i] = g - CAFFE_MEAN_BGR[1];
                data[2 * plane + i] = r - CAFFE_MEAN_BGR[2];
            }
            Normalization::Torch => {
                data[i] = (r / 255.0 - TORCH_MEAN_RGB[0]) / TORCH_STD_RGB[0];
                data[plane + i] = (g / 255.0 - TORCH_MEAN_RGB[1]) / TORCH_STD_RGB[1];
                data[2 * plane + i] = (b / 255.0 - TORCH_MEAN_RGB[2]) / TORCH_STD_RGB[2];
            }
        }
    }

    data
}
