//! Second-stage stacking regressor
//!
//! The artifact declares exactly what the final estimator consumes: the
//! ordered upstream predictions named in `inputs`, optionally followed by the
//! multimodal feature vector itself (`passthrough`). The final estimator is
//! linear and works in the space named by `target_transform`; the price is
//! recovered with the transform's inverse.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::linear::LinearRegressor;
use crate::regressor::Regressor;

pub const STACKING_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    STACKING_FORMAT_VERSION
}

/// An upstream prediction fed to the final estimator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StackInput {
    Multimodal,
    Tabular,
}

impl StackInput {
    pub fn name(&self) -> &'static str {
        match self {
            StackInput::Multimodal => "multimodal",
            StackInput::Tabular => "tabular",
        }
    }
}

/// Space in which the stacking estimate is expressed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetTransform {
    /// Trained on `ln(1 + price)`; inverted with `exp(x) - 1`
    #[default]
    Log1p,
    Identity,
}

impl TargetTransform {
    #[inline]
    pub fn inverse(&self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.exp_m1(),
            TargetTransform::Identity => y,
        }
    }
}

/// Upstream estimates available for one request
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpstreamPredictions {
    pub multimodal: Option<f64>,
    pub tabular: Option<f64>,
}

impl UpstreamPredictions {
    fn get(&self, input: StackInput) -> Result<f64, ModelError> {
        match input {
            StackInput::Multimodal => self.multimodal,
            StackInput::Tabular => self.tabular,
        }
        .ok_or(ModelError::MissingInput(input.name()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackingRegressor {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub inputs: Vec<StackInput>,
    #[serde(default)]
    pub passthrough: bool,
    pub final_estimator: LinearRegressor,
    #[serde(default)]
    pub target_transform: TargetTransform,
}

impl StackingRegressor {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when the tabular model's estimate is part of the stack
    pub fn uses(&self, input: StackInput) -> bool {
        self.inputs.contains(&input)
    }

    /// Width of the final estimator's input row
    pub fn input_width(&self, feature_width: usize) -> usize {
        self.inputs.len() + if self.passthrough { feature_width } else { 0 }
    }

    /// Check the artifact against the width of the multimodal feature vector
    pub fn validate(&self, feature_width: usize) -> Result<(), ModelError> {
        if self.format_version != STACKING_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(self.format_version));
        }
        if self.inputs.is_empty() {
            return Err(ModelError::NoInputs);
        }
        let expected = self.input_width(feature_width);
        if self.final_estimator.num_features() != expected {
            return Err(ModelError::CoefficientCount {
                expected,
                actual: self.final_estimator.num_features(),
            });
        }
        Ok(())
    }

    /// Estimate in the transformed target space
    pub fn predict_transformed(&self, upstream: &UpstreamPredictions, features: &[f32]) -> Result<f64, ModelError> {
        let mut row = Vec::with_capacity(self.input_width(features.len()));
        for input in &self.inputs {
            row.push(upstream.get(*input)? as f32);
        }
        if self.passthrough {
            row.extend_from_slice(features);
        }
        self.final_estimator.predict(&row)
    }

    /// Estimate in price space
    pub fn predict_price(&self, upstream: &UpstreamPredictions, features: &[f32]) -> Result<f64, ModelError> {
        let y = self.target_transform.inverse(self.predict_transformed(upstream, features)?);
        if !y.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(y)
    }
}
