//! Column Router
//!
//! Applies every fitted group of a pipeline to its columns and concatenates
//! the blocks, in group order, into one feature vector.

use gemprice_core::{FeatureVector, ImageEmbedder, RawRecord};
use rayon::prelude::*;
use std::sync::Arc;

use crate::pipeline::{FittedPipeline, GroupStep, ImageStep};
use crate::schema::SchemaError;

/// Routes raw records through a fitted pipeline
#[derive(Clone)]
pub struct ColumnRouter {
    pipeline: FittedPipeline,
    embedder: Option<Arc<dyn ImageEmbedder>>,
}

impl std::fmt::Debug for ColumnRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnRouter")
            .field("pipeline", &self.pipeline.name)
            .field("output_width", &self.pipeline.output_width)
            .field("has_embedder", &self.embedder.is_some())
            .finish()
    }
}

impl ColumnRouter {
    /// Create a router for a pipeline without an image group
    pub fn new(pipeline: FittedPipeline) -> Result<Self, SchemaError> {
        Self::build(pipeline, None)
    }

    /// Create a router whose image group is served by `embedder`
    pub fn with_embedder(pipeline: FittedPipeline, embedder: Arc<dyn ImageEmbedder>) -> Result<Self, SchemaError> {
        Self::build(pipeline, Some(embedder))
    }

    fn build(pipeline: FittedPipeline, embedder: Option<Arc<dyn ImageEmbedder>>) -> Result<Self, SchemaError> {
        pipeline.validate()?;

        if let Some(step) = pipeline.image_step() {
            let embedder = embedder.as_ref().ok_or(SchemaError::MissingEmbedder)?;
            if embedder.dim() != step.dim {
                return Err(SchemaError::EmbedderDim {
                    expected: step.dim,
                    actual: embedder.dim(),
                });
            }
        }

        Ok(Self { pipeline, embedder })
    }

    pub fn pipeline(&self) -> &FittedPipeline {
        &self.pipeline
    }

    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    pub fn output_width(&self) -> usize {
        self.pipeline.output_width
    }

    pub fn feature_names(&self) -> &[String] {
        &self.pipeline.feature_names
    }

    pub fn is_multimodal(&self) -> bool {
        self.pipeline.has_image_group()
    }

    /// Convert one record to a feature vector
    ///
    /// The vector is constructed by:
    /// 1. Iterating through the fitted groups in persisted order
    /// 2. Imputing and encoding each group's columns
    /// 3. Concatenating the blocks
    /// 4. Checking the result against the fitted width
    pub fn transform(&self, record: &RawRecord) -> Result<FeatureVector, SchemaError> {
        let mut out = FeatureVector::with_capacity(self.output_width());

        for group in &self.pipeline.groups {
            match &group.step {
                GroupStep::Numeric(t) => t.transform_into(record, &mut out)?,
                GroupStep::Ordinal(t) => t.transform_into(record, &mut out)?,
                GroupStep::Nominal(t) => t.transform_into(record, &mut out)?,
                GroupStep::Image(step) => out.extend_from_slice(&self.embed_image(step, record)),
            }
        }

        out.ensure_dim(self.output_width())?;
        Ok(out)
    }

    /// Convert several records, in parallel; output order matches input order
    pub fn transform_batch(&self, records: &[RawRecord]) -> Result<Vec<FeatureVector>, SchemaError> {
        records.par_iter().map(|r| self.transform(r)).collect()
    }

    fn embed_image(&self, step: &ImageStep, record: &RawRecord) -> Vec<f32> {
        let Some(embedder) = &self.embedder else {
            // build() guarantees an embedder for image pipelines
            return vec![0.0; step.dim];
        };

        let embedding = match record.image_path() {
            Some(path) => embedder.embed_path(path),
            None => {
                tracing::warn!(column = %step.column, "record has no image path, using zero embedding");
                vec![0.0; step.dim]
            }
        };

        if embedding.len() != step.dim {
            tracing::warn!(
                expected = step.dim,
                actual = embedding.len(),
                "image embedder returned the wrong width, using zero embedding"
            );
            return vec![0.0; step.dim];
        }
        embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::ranks::UNKNOWN_RANK;
    use crate::schema::PipelineSchema;
    use gemprice_core::{Column, Embedding};
    use std::path::Path;

    struct FixedEmbedder {
        dim: usize,
    }

    impl ImageEmbedder for FixedEmbedder {
        fn dim(&self) -> usize {
            self.dim
        }

        fn embed_path(&self, path: &Path) -> Embedding {
            if path.exists() {
                vec![0.5; self.dim]
            } else {
                vec![0.0; self.dim]
            }
        }
    }

    fn diamond(weight: f64, cut: &str, clarity: &str, shape: &str) -> RawRecord {
        RawRecord::new()
            .with_number(Column::Weight, weight)
            .with_number(Column::X, weight * 6.0)
            .with_number(Column::Y, weight * 6.0)
            .with_number(Column::Z, weight * 4.0)
            .with_text(Column::Cut, cut)
            .with_text(Column::Polish, cut)
            .with_text(Column::Symmetry, cut)
            .with_text(Column::Clarity, clarity)
            .with_text(Column::Colour, "H")
            .with_text(Column::Fluorescence, "N")
            .with_text(Column::Shape, shape)
    }

    fn training_rows() -> Vec<RawRecord> {
        vec![
            diamond(0.9, "EX", "VS1", "Round"),
            diamond(1.2, "VG", "SI2", "Cushion"),
            diamond(0.5, "EX", "IF", "Heart"),
            diamond(1.0, "GD", "VS2", "Round"),
        ]
    }

    fn tabular_router() -> ColumnRouter {
        let pipeline = PipelineBuilder::new(PipelineSchema::tabular())
            .name("tabular")
            .fit(&training_rows())
            .unwrap();
        ColumnRouter::new(pipeline).unwrap()
    }

    #[test]
    fn test_width_and_idempotence() {
        let router = tabular_router();
        let record = diamond(0.7, "VG", "VVS2", "Heart");

        let v1 = router.transform(&record).unwrap();
        let v2 = router.transform(&record).unwrap();

        assert_eq!(v1.dim(), router.output_width());
        let bits1: Vec<u32> = v1.as_slice().iter().map(|x| x.to_bits()).collect();
        let bits2: Vec<u32> = v2.as_slice().iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits1, bits2);
    }

    #[test]
    fn test_unknown_categories_keep_width() {
        let router = tabular_router();
        let record = diamond(0.7, "Ideal", "FL", "Trillion");
        let v = router.transform(&record).unwrap();

        assert_eq!(v.dim(), router.output_width());
        // ord block starts after the four numerics
        assert_eq!(v.block(4, 4).unwrap(), &[UNKNOWN_RANK, UNKNOWN_RANK, UNKNOWN_RANK, UNKNOWN_RANK]);
        // shape block: vocabulary is Cushion, Heart, Round
        let names = router.feature_names();
        let shape_start = names.iter().position(|n| n.starts_with("nom__Shape_")).unwrap();
        assert!(v.block(shape_start, 3).unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_empty_record_is_imputed() {
        let router = tabular_router();
        let v = router.transform(&RawRecord::new()).unwrap();
        assert_eq!(v.dim(), router.output_width());
        assert!(v.as_slice().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_image_pipeline_requires_embedder() {
        let pipeline = PipelineBuilder::new(PipelineSchema::multimodal())
            .image_dim(8)
            .fit(&training_rows())
            .unwrap();
        assert!(matches!(
            ColumnRouter::new(pipeline.clone()),
            Err(SchemaError::MissingEmbedder)
        ));
        assert!(matches!(
            ColumnRouter::with_embedder(pipeline, Arc::new(FixedEmbedder { dim: 4 })),
            Err(SchemaError::EmbedderDim { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn test_image_block_appended_last() {
        let pipeline = PipelineBuilder::new(PipelineSchema::multimodal())
            .image_dim(8)
            .fit(&training_rows())
            .unwrap();
        let tabular_width = pipeline.output_width - 8;
        let router = ColumnRouter::with_embedder(pipeline, Arc::new(FixedEmbedder { dim: 8 })).unwrap();

        let image = tempfile::NamedTempFile::new().unwrap();
        let record = diamond(0.9, "EX", "VS1", "Round").with_image_path(image.path());
        let v = router.transform(&record).unwrap();
        assert_eq!(v.block(tabular_width, 8).unwrap(), &[0.5; 8]);

        let missing = diamond(0.9, "EX", "VS1", "Round");
        let v = router.transform(&missing).unwrap();
        assert!(v.block(tabular_width, 8).unwrap().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_batch_matches_single() {
        let router = tabular_router();
        let rows = training_rows();
        let batch = router.transform_batch(&rows).unwrap();
        assert_eq!(batch.len(), rows.len());
        for (row, vector) in rows.iter().zip(&batch) {
            assert_eq!(&router.transform(row).unwrap(), vector);
        }
    }
}
