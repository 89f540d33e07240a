use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Width of the pooled image embedding produced by the ResNet-50 backbone.
pub const EMBEDDING_DIM: usize = 2048;

/// A dense image embedding. All zeros means extraction failed.
pub type Embedding = Vec<f32>;

/// The fixed-width numeric row fed to a regressor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    data: Vec<f32>,
}

impl FeatureVector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    /// Append one transformer's output block
    #[inline]
    pub fn extend_from_slice(&mut self, block: &[f32]) {
        self.data.extend_from_slice(block);
    }

    /// Borrow the block `[start, start + len)`, e.g. the image embedding
    pub fn block(&self, start: usize, len: usize) -> Option<&[f32]> {
        self.data.get(start..start.checked_add(len)?)
    }

    /// Fail with [`Error::FeatureMismatch`] unless the width is exactly `expected`
    pub fn ensure_dim(&self, expected: usize) -> Result<()> {
        if self.dim() != expected {
            return Err(Error::FeatureMismatch {
                expected,
                actual: self.dim(),
            });
        }
        Ok(())
    }

    /// True when every component is exactly zero
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|x| *x == 0.0)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}
