//! Pipeline schema definitions
//!
//! The schema is the static column-to-transformer assignment: an ordered
//! list of column groups, each handled by one transformer kind. Group order
//! is output order, so the schema fixes the layout of every feature vector.

use gemprice_core::{Column, ValueType};
use serde::{Deserialize, Serialize};

/// Version of the persisted pipeline layout
pub const PIPELINE_FORMAT_VERSION: u32 = 1;

/// Ordered column groups of a preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSchema {
    pub groups: Vec<ColumnGroup>,
}

impl PipelineSchema {
    pub fn new(groups: Vec<ColumnGroup>) -> Self {
        Self { groups }
    }

    /// Numeric, ordinal and nominal groups over the twelve tabular columns
    pub fn tabular() -> Self {
        Self::new(vec![
            ColumnGroup::numeric(vec![Column::Weight, Column::X, Column::Y, Column::Z]),
            ColumnGroup::ordinal(vec![
                Column::Cut,
                Column::Polish,
                Column::Symmetry,
                Column::Clarity,
                Column::Colour,
            ]),
            ColumnGroup::nominal(vec![Column::Fluorescence, Column::Shape, Column::ColourIsFancy]),
        ])
    }

    /// The tabular groups followed by the image group
    pub fn multimodal() -> Self {
        let mut schema = Self::tabular();
        schema.groups.push(ColumnGroup::image());
        schema
    }

    pub fn has_image_group(&self) -> bool {
        self.groups.iter().any(|g| g.kind == GroupKind::Image)
    }

    /// All columns in output order
    pub fn columns(&self) -> Vec<Column> {
        self.groups.iter().flat_map(|g| g.columns.iter().copied()).collect()
    }

    /// Check that the assignment is well formed
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.groups.is_empty() {
            return Err(SchemaError::EmptySchema);
        }

        let mut seen_groups: Vec<&str> = Vec::new();
        let mut seen_columns: Vec<Column> = Vec::new();
        let mut image_groups = 0;

        for group in &self.groups {
            if seen_groups.contains(&group.name.as_str()) {
                return Err(SchemaError::DuplicateGroup(group.name.clone()));
            }
            seen_groups.push(&group.name);

            if group.columns.is_empty() {
                return Err(SchemaError::EmptyGroup(group.name.clone()));
            }

            for column in &group.columns {
                if seen_columns.contains(column) {
                    return Err(SchemaError::DuplicateColumn(column.name().to_string()));
                }
                seen_columns.push(*column);

                if column.value_type() != group.kind.value_type() {
                    return Err(SchemaError::ColumnKind {
                        column: column.name().to_string(),
                        group: group.name.clone(),
                    });
                }
            }

            if group.kind == GroupKind::Image {
                image_groups += 1;
                if group.columns.len() != 1 {
                    return Err(SchemaError::InvalidImageGroup(format!(
                        "group '{}' must hold exactly one image column",
                        group.name
                    )));
                }
            }
        }

        if image_groups > 1 {
            return Err(SchemaError::InvalidImageGroup(
                "at most one image group is allowed".to_string(),
            ));
        }

        Ok(())
    }
}

/// One transformer applied to a list of columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnGroup {
    /// Group name, also the prefix of its feature names (`num__Weight`)
    pub name: String,
    pub kind: GroupKind,
    pub columns: Vec<Column>,
}

impl ColumnGroup {
    pub fn new(name: impl Into<String>, kind: GroupKind, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            kind,
            columns,
        }
    }

    pub fn numeric(columns: Vec<Column>) -> Self {
        Self::new("num", GroupKind::Numeric, columns)
    }

    pub fn ordinal(columns: Vec<Column>) -> Self {
        Self::new("ord", GroupKind::Ordinal, columns)
    }

    pub fn nominal(columns: Vec<Column>) -> Self {
        Self::new("nom", GroupKind::Nominal, columns)
    }

    pub fn image() -> Self {
        Self::new("img", GroupKind::Image, vec![Column::ImagePath])
    }
}

/// Transformer kind of a column group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Median imputation, then standard scaling
    Numeric,
    /// Most-frequent imputation, then rank encoding
    Ordinal,
    /// Most-frequent imputation, then one-hot encoding
    Nominal,
    /// Image path to pooled CNN embedding
    Image,
}

impl GroupKind {
    pub fn value_type(&self) -> ValueType {
        match self {
            GroupKind::Numeric => ValueType::Numeric,
            GroupKind::Ordinal | GroupKind::Nominal => ValueType::Categorical,
            GroupKind::Image => ValueType::ImagePath,
        }
    }
}

/// Errors raised while validating, fitting or applying a pipeline
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema cannot be empty")]
    EmptySchema,

    #[error("Group '{0}' has no columns")]
    EmptyGroup(String),

    #[error("Group '{0}' appears more than once")]
    DuplicateGroup(String),

    #[error("Column '{0}' is assigned to more than one group")]
    DuplicateColumn(String),

    #[error("Column '{column}' does not fit the transformer of group '{group}'")]
    ColumnKind { column: String, group: String },

    #[error("Invalid image group: {0}")]
    InvalidImageGroup(String),

    #[error("Invalid rank table: {0}")]
    InvalidRankTable(String),

    #[error("No rank table for ordinal column '{0}'")]
    MissingRankTable(String),

    #[error("Column '{0}' has no observed values to fit on")]
    NoObservedValues(String),

    #[error("Invalid fitted parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported pipeline format version {0}")]
    UnsupportedVersion(u32),

    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("Image embedder width {actual} does not match fitted image width {expected}")]
    EmbedderDim { expected: usize, actual: usize },

    #[error("Pipeline has an image group but no image embedder was supplied")]
    MissingEmbedder,

    #[error(transparent)]
    Core(#[from] gemprice_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schemas_validate() {
        let tabular = PipelineSchema::tabular();
        tabular.validate().unwrap();
        assert_eq!(tabular.columns().len(), 12);
        assert!(!tabular.has_image_group());

        let multimodal = PipelineSchema::multimodal();
        multimodal.validate().unwrap();
        assert_eq!(multimodal.columns().len(), 13);
        assert_eq!(multimodal.columns().last(), Some(&Column::ImagePath));
    }

    #[test]
    fn test_empty_schema_error() {
        assert!(matches!(
            PipelineSchema::new(vec![]).validate(),
            Err(SchemaError::EmptySchema)
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = PipelineSchema::new(vec![
            ColumnGroup::numeric(vec![Column::Weight]),
            ColumnGroup::new("num2", GroupKind::Numeric, vec![Column::Weight]),
        ]);
        assert!(matches!(schema.validate(), Err(SchemaError::DuplicateColumn(c)) if c == "Weight"));
    }

    #[test]
    fn test_column_kind_rejected() {
        let schema = PipelineSchema::new(vec![ColumnGroup::ordinal(vec![Column::Weight])]);
        assert!(matches!(schema.validate(), Err(SchemaError::ColumnKind { .. })));

        let schema = PipelineSchema::new(vec![ColumnGroup::new(
            "img",
            GroupKind::Image,
            vec![Column::Shape],
        )]);
        assert!(matches!(schema.validate(), Err(SchemaError::ColumnKind { .. })));
    }

    #[test]
    fn test_serde_roundtrip() {
        let schema = PipelineSchema::multimodal();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"Colour_IsFancy\""));
        assert!(json.contains("\"image\""));
        let parsed: PipelineSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
    }
}
