//! Numeric transformer: median imputation followed by standard scaling

use gemprice_core::{Column, FeatureVector, RawRecord};
use serde::{Deserialize, Serialize};

use crate::impute::{mean_std, median};
use crate::schema::SchemaError;

/// Fitted parameters of one numeric column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericColumn {
    pub column: Column,
    /// Fill value for missing entries
    pub median: f64,
    pub mean: f64,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: f64,
}

impl NumericColumn {
    #[inline]
    pub fn apply(&self, value: Option<f64>) -> f32 {
        let v = value.unwrap_or(self.median);
        ((v - self.mean) / self.scale) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericTransformer {
    pub columns: Vec<NumericColumn>,
}

impl NumericTransformer {
    pub fn fit(columns: &[Column], records: &[RawRecord]) -> Result<Self, SchemaError> {
        let mut fitted = Vec::with_capacity(columns.len());

        for &column in columns {
            let raw: Vec<Option<f64>> = records
                .iter()
                .map(|r| r.number(column))
                .collect::<Result<_, _>>()?;

            let observed: Vec<f64> = raw.iter().flatten().copied().collect();
            let fill = median(&observed)
                .ok_or_else(|| SchemaError::NoObservedValues(column.name().to_string()))?;

            let imputed: Vec<f64> = raw.iter().map(|v| v.unwrap_or(fill)).collect();
            let (mean, std) = mean_std(&imputed)
                .ok_or_else(|| SchemaError::NoObservedValues(column.name().to_string()))?;

            fitted.push(NumericColumn {
                column,
                median: fill,
                mean,
                scale: if std < f64::EPSILON { 1.0 } else { std },
            });
        }

        Ok(Self { columns: fitted })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn transform_into(&self, record: &RawRecord, out: &mut FeatureVector) -> Result<(), SchemaError> {
        for col in &self.columns {
            out.extend_from_slice(&[col.apply(record.number(col.column)?)]);
        }
        Ok(())
    }

    pub fn feature_names(&self, prefix: &str) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{}__{}", prefix, c.column))
            .collect()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for c in &self.columns {
            if !(c.median.is_finite() && c.mean.is_finite() && c.scale.is_finite()) || c.scale <= 0.0 {
                return Err(SchemaError::InvalidParameters(format!(
                    "numeric column '{}' has non-finite or non-positive statistics",
                    c.column
                )));
            }
        }
        Ok(())
    }
}
