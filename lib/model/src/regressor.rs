//! The common inference interface

use crate::error::ModelError;

/// A fitted single-output regressor
pub trait Regressor: Send + Sync {
    /// Number of features a row must have
    fn num_features(&self) -> usize;

    /// Predict one row; the row length must equal [`num_features`](Self::num_features)
    fn predict(&self, features: &[f32]) -> Result<f64, ModelError>;

    /// Predict several rows
    fn predict_batch(&self, rows: &[&[f32]]) -> Result<Vec<f64>, ModelError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

/// Reject rows whose length differs from the model's feature count
#[inline]
pub(crate) fn check_features(expected: usize, features: &[f32]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::FeatureCount {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}
