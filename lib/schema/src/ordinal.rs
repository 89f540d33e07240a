//! Ordinal transformer: most-frequent imputation followed by rank encoding

use gemprice_core::{Column, FeatureVector, RawRecord};
use serde::{Deserialize, Serialize};

use crate::impute::most_frequent;
use crate::ranks::RankTable;
use crate::schema::SchemaError;

/// Fitted parameters of one ordinal column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrdinalColumn {
    pub column: Column,
    /// Fill value for missing entries
    pub fill: String,
    /// Grade order, persisted with the pipeline
    pub table: RankTable,
}

impl OrdinalColumn {
    #[inline]
    pub fn apply(&self, value: Option<&str>) -> f32 {
        self.table.encode(value.unwrap_or(&self.fill))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrdinalTransformer {
    pub columns: Vec<OrdinalColumn>,
}

impl OrdinalTransformer {
    pub fn fit(columns: &[Column], records: &[RawRecord]) -> Result<Self, SchemaError> {
        let mut fitted = Vec::with_capacity(columns.len());

        for &column in columns {
            let table = RankTable::for_column(column)
                .ok_or_else(|| SchemaError::MissingRankTable(column.name().to_string()))?;

            let observed: Vec<&str> = records
                .iter()
                .filter_map(|r| r.text(column).transpose())
                .collect::<Result<_, _>>()?;
            let fill = most_frequent(observed)
                .ok_or_else(|| SchemaError::NoObservedValues(column.name().to_string()))?;

            fitted.push(OrdinalColumn { column, fill, table });
        }

        Ok(Self { columns: fitted })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn transform_into(&self, record: &RawRecord, out: &mut FeatureVector) -> Result<(), SchemaError> {
        for col in &self.columns {
            out.extend_from_slice(&[col.apply(record.text(col.column)?)]);
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
            c.table.validate()?;
            if c.fill.trim().is_empty() {
                return Err(SchemaError::InvalidParameters(format!(
                    "ordinal column '{}' has an empty fill value",
                    c.column
                )));
            }
        }
        Ok(())
    }
}
