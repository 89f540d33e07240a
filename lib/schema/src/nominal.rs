//! Nominal transformer: most-frequent imputation followed by one-hot encoding

use gemprice_core::{Column, FeatureVector, RawRecord};
use serde::{Deserialize, Serialize};

use crate::impute::most_frequent;
use crate::schema::SchemaError;

/// Fitted parameters of one nominal column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NominalColumn {
    pub column: Column,
    /// Fill value for missing entries
    pub fill: String,
    /// Categories seen at fit time, sorted; one indicator per entry
    pub vocabulary: Vec<String>,
}

impl NominalColumn {
    /// Index of the hot indicator, `None` for a category unseen at fit time
    #[inline]
    pub fn index_of(&self, value: Option<&str>) -> Option<usize> {
        let v = value.unwrap_or(&self.fill);
        self.vocabulary.binary_search_by(|c| c.as_str().cmp(v)).ok()
    }

    fn encode_into(&self, value: Option<&str>, block: &mut Vec<f32>) {
        let start = block.len();
        block.resize(start + self.vocabulary.len(), 0.0);
        if let Some(i) = self.index_of(value) {
            block[start + i] = 1.0;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NominalTransformer {
    pub columns: Vec<NominalColumn>,
}

impl NominalTransformer {
    pub fn fit(columns: &[Column], records: &[RawRecord]) -> Result<Self, SchemaError> {
        let mut fitted = Vec::with_capacity(columns.len());

        for &column in columns {
            let raw: Vec<Option<&str>> = records
                .iter()
                .map(|r| r.text(column))
                .collect::<Result<_, _>>()?;

            let fill = most_frequent(raw.iter().flatten().copied())
                .ok_or_else(|| SchemaError::NoObservedValues(column.name().to_string()))?;

            let mut vocabulary: Vec<String> = raw
                .iter()
                .map(|v| v.unwrap_or(&fill).to_string())
                .collect();
            vocabulary.sort();
            vocabulary.dedup();

            fitted.push(NominalColumn {
                column,
                fill,
                vocabulary,
            });
        }

        Ok(Self { columns: fitted })
    }

    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| c.vocabulary.len()).sum()
    }

    pub fn transform_into(&self, record: &RawRecord, out: &mut FeatureVector) -> Result<(), SchemaError> {
        let mut block = Vec::with_capacity(self.width());
        for col in &self.columns {
            col.encode_into(record.text(col.column)?, &mut block);
        }
        out.extend_from_slice(&block);
        Ok(())
    }

    pub fn feature_names(&self, prefix: &str) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.vocabulary
                    .iter()
                    .map(move |v| format!("{}__{}_{}", prefix, c.column, v))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for c in &self.columns {
            if c.vocabulary.is_empty() {
                return Err(SchemaError::InvalidParameters(format!(
                    "nominal column '{}' has an empty vocabulary",
                    c.column
                )));
            }
            // index_of relies on a strictly increasing vocabulary
            if c.vocabulary.windows(2).any(|w| w[0] >= w[1]) {
                return Err(SchemaError::InvalidParameters(format!(
                    "nominal column '{}' vocabulary is not sorted and unique",
                    c.column
                )));
            }
        }
        Ok(())
    }
}
