//! Linear regressor used as the stacking final estimator

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::regressor::{check_features, Regressor};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Regressor for LinearRegressor {
    fn num_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f32]) -> Result<f64, ModelError> {
        check_features(self.coefficients.len(), features)?;
        let y = self
            .coefficients
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (w, x)| acc + w * *x as f64);
        if !y.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(y)
    }
}
