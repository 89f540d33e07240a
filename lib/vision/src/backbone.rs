//! Convolutional backbones
//!
//! A [`Backbone`] maps one preprocessed image to its pooled penultimate-layer
//! activations. [`ResNet50Backbone`] runs ResNet-50 without its
//! classification head, so the output is the 2048-wide global average pool.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use gemprice_core::EMBEDDING_DIM;
use std::path::Path;

use crate::error::VisionError;
use crate::preprocess::Normalization;

/// A frozen network producing one embedding per image
pub trait Backbone: Send + Sync {
    /// Human readable name, reported in the extractor status
    fn name(&self) -> &str;

    /// Width of the pooled output
    fn output_dim(&self) -> usize;

    /// Run one forward pass over a `[3, size, size]` channel-first buffer
    fn forward(&self, pixels: Vec<f32>, size: usize) -> Result<Vec<f32>, VisionError>;

    /// Input normalization the weights were trained with, if fixed
    fn normalization(&self) -> Option<Normalization> {
        None
    }
}

/// ResNet-50 with weights loaded from a safetensors file
///
/// The loader reads the torchvision parameter layout, so inputs must be
/// [`Normalization::Torch`].
pub struct ResNet50Backbone {
    model: Func<'static>,
    device: Device,
}

impl ResNet50Backbone {
    pub const NORMALIZATION: Normalization = Normalization::Torch;

    pub fn load(weights: &Path, device: Device) -> Result<Self, VisionError> {
        if !weights.is_file() {
            return Err(VisionError::WeightsNotFound(weights.to_path_buf()));
        }

        // Safety: the weights file is opened read-only and is not modified
        // while the process runs.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = resnet::resnet50_no_final_layer(vb)?;

        tracing::info!(weights = %weights.display(), "loaded ResNet-50 backbone");
        Ok(Self { model, device })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Backbone for ResNet50Backbone {
    fn name(&self) -> &str {
        "resnet50"
    }

    fn output_dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn forward(&self, pixels: Vec<f32>, size: usize) -> Result<Vec<f32>, VisionError> {
        let input = Tensor::from_vec(pixels, (1, 3, size, size), &self.device)?;
        let pooled = self.model.forward(&input)?;
        Ok(pooled.flatten_all()?.to_vec1::<f32>()?)
    }

    fn normalization(&self) -> Option<Normalization> {
        Some(Self::NORMALIZATION)
    }
}
