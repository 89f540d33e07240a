//! Fitted preprocessing pipelines
//!
//! A [`FittedPipeline`] is the persisted form of a preprocessing pipeline:
//! the ordered column groups with their fitted parameters, plus the output
//! width and feature names computed at fit time. The layout metadata is
//! stored alongside the parameters so a loaded pipeline can be checked
//! against what it actually produces before it serves any request.

use gemprice_core::{Column, RawRecord, EMBEDDING_DIM};
use serde::{Deserialize, Serialize};

use crate::nominal::NominalTransformer;
use crate::numeric::NumericTransformer;
use crate::ordinal::OrdinalTransformer;
use crate::schema::{ColumnGroup, GroupKind, PipelineSchema, SchemaError, PIPELINE_FORMAT_VERSION};

/// Image embedding step; the embedder itself is supplied at load time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageStep {
    pub column: Column,
    /// Embedding width the downstream model was trained on
    pub dim: usize,
}

/// Fitted transformer of one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroupStep {
    Numeric(NumericTransformer),
    Ordinal(OrdinalTransformer),
    Nominal(NominalTransformer),
    Image(ImageStep),
}

impl GroupStep {
    pub fn kind(&self) -> GroupKind {
        match self {
            GroupStep::Numeric(_) => GroupKind::Numeric,
            GroupStep::Ordinal(_) => GroupKind::Ordinal,
            GroupStep::Nominal(_) => GroupKind::Nominal,
            GroupStep::Image(_) => GroupKind::Image,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            GroupStep::Numeric(t) => t.width(),
            GroupStep::Ordinal(t) => t.width(),
            GroupStep::Nominal(t) => t.width(),
            GroupStep::Image(step) => step.dim,
        }
    }

    pub fn columns(&self) -> Vec<Column> {
        match self {
            GroupStep::Numeric(t) => t.columns.iter().map(|c| c.column).collect(),
            GroupStep::Ordinal(t) => t.columns.iter().map(|c| c.column).collect(),
            GroupStep::Nominal(t) => t.columns.iter().map(|c| c.column).collect(),
            GroupStep::Image(step) => vec![step.column],
        }
    }

    fn feature_names(&self, prefix: &str) -> Vec<String> {
        match self {
            GroupStep::Numeric(t) => t.feature_names(prefix),
            GroupStep::Ordinal(t) => t.feature_names(prefix),
            GroupStep::Nominal(t) => t.feature_names(prefix),
            GroupStep::Image(step) => (0..step.dim)
                .map(|i| format!("{}__feature_{}", prefix, i))
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        match self {
            GroupStep::Numeric(t) => t.validate(),
            GroupStep::Ordinal(t) => t.validate(),
            GroupStep::Nominal(t) => t.validate(),
            GroupStep::Image(step) if step.dim == 0 => Err(SchemaError::InvalidParameters(
                "image step has zero width".to_string(),
            )),
            GroupStep::Image(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FittedGroup {
    pub name: String,
    pub step: GroupStep,
}

/// A preprocessing pipeline with all parameters fitted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FittedPipeline {
    pub format_version: u32,
    pub name: String,
    pub groups: Vec<FittedGroup>,
    /// Width of every feature vector this pipeline emits
    pub output_width: usize,
    /// Output column names, in output order
    pub feature_names: Vec<String>,
}

impl FittedPipeline {
    /// Fit with the default 2048-wide image step
    pub fn fit(name: &str, schema: &PipelineSchema, records: &[RawRecord]) -> Result<Self, SchemaError> {
        PipelineBuilder::new(schema.clone()).name(name).fit(records)
    }

    /// The column assignment this pipeline was fitted with
    pub fn schema(&self) -> PipelineSchema {
        PipelineSchema::new(
            self.groups
                .iter()
                .map(|g| ColumnGroup::new(g.name.clone(), g.step.kind(), g.step.columns()))
                .collect(),
        )
    }

    pub fn image_step(&self) -> Option<&ImageStep> {
        self.groups.iter().find_map(|g| match &g.step {
            GroupStep::Image(step) => Some(step),
            _ => None,
        })
    }

    pub fn has_image_group(&self) -> bool {
        self.image_step().is_some()
    }

    /// Width the fitted parameters actually produce
    pub fn computed_width(&self) -> usize {
        self.groups.iter().map(|g| g.step.width()).sum()
    }

    /// Feature names the fitted parameters actually produce
    pub fn computed_feature_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.step.feature_names(&g.name))
            .collect()
    }

    /// Check version, column assignment, parameters and layout metadata
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.format_version != PIPELINE_FORMAT_VERSION {
            return Err(SchemaError::UnsupportedVersion(self.format_version));
        }

        self.schema().validate()?;

        for group in &self.groups {
            group.step.validate()?;
        }

        let width = self.computed_width();
        if width != self.output_width {
            return Err(SchemaError::FeatureMismatch(format!(
                "pipeline '{}' declares {} output features but its parameters produce {}",
                self.name, self.output_width, width
            )));
        }

        let names = self.computed_feature_names();
        if names != self.feature_names {
            let position = names
                .iter()
                .zip(&self.feature_names)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| names.len().min(self.feature_names.len()));
            return Err(SchemaError::FeatureMismatch(format!(
                "pipeline '{}' feature order differs from its metadata at position {}",
                self.name, position
            )));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let pipeline: Self = serde_json::from_str(json).map_err(gemprice_core::Error::from)?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self).map_err(gemprice_core::Error::from)?)
    }
}

/// Builder for fitting a [`FittedPipeline`] from training records
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    schema: PipelineSchema,
    name: String,
    image_dim: usize,
}

impl PipelineBuilder {
    pub fn new(schema: PipelineSchema) -> Self {
        Self {
            schema,
            name: "pipeline".to_string(),
            image_dim: EMBEDDING_DIM,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn image_dim(mut self, dim: usize) -> Self {
        self.image_dim = dim;
        self
    }

    pub fn fit(self, records: &[RawRecord]) -> Result<FittedPipeline, SchemaError> {
        self.schema.validate()?;

        let mut groups = Vec::with_capacity(self.schema.groups.len());
        for group in &self.schema.groups {
            let step = match group.kind {
                GroupKind::Numeric => GroupStep::Numeric(NumericTransformer::fit(&group.columns, records)?),
                GroupKind::Ordinal => GroupStep::Ordinal(OrdinalTransformer::fit(&group.columns, records)?),
                GroupKind::Nominal => GroupStep::Nominal(NominalTransformer::fit(&group.columns, records)?),
                GroupKind::Image => GroupStep::Image(ImageStep {
                    column: group.columns[0],
                    dim: self.image_dim,
                }),
            };
            groups.push(FittedGroup {
                name: group.name.clone(),
                step,
            });
        }

        let mut pipeline = FittedPipeline {
            format_version: PIPELINE_FORMAT_VERSION,
            name: self.name,
            groups,
            output_width: 0,
            feature_names: Vec::new(),
        };
        pipeline.output_width = pipeline.computed_width();
        pipeline.feature_names = pipeline.computed_feature_names();
        pipeline.validate()?;

        tracing::debug!(
            pipeline = %pipeline.name,
            width = pipeline.output_width,
            rows = records.len(),
            "fitted preprocessing pipeline"
        );
        Ok(pipeline)
    }
}
