//! Immutable prediction context
//!
//! Everything a request needs is loaded once at start, cross-checked, and
//! then only read. The context is `Send + Sync` and shared behind an `Arc`.

use gemprice_core::ImageEmbedder;
use gemprice_model::{GradientBoostedRegressor, Regressor, StackingRegressor};
use gemprice_schema::{ColumnRouter, FittedPipeline};
use gemprice_storage::{ArtifactKind, ArtifactStore};
use gemprice_vision::ImageFeatureExtractor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StartupError;

/// The fitted artifacts, before cross-validation
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub tabular_pipeline: FittedPipeline,
    pub tabular_regressor: GradientBoostedRegressor,
    pub multimodal_pipeline: FittedPipeline,
    pub multimodal_regressor: GradientBoostedRegressor,
    pub stacking_regressor: StackingRegressor,
}

impl Artifacts {
    pub fn load(store: &ArtifactStore) -> Result<Self, StartupError> {
        Ok(Self {
            tabular_pipeline: load_pipeline(store, ArtifactKind::TabularPipeline)?,
            tabular_regressor: load_regressor(store, ArtifactKind::TabularRegressor)?,
            multimodal_pipeline: load_pipeline(store, ArtifactKind::MultimodalPipeline)?,
            multimodal_regressor: load_regressor(store, ArtifactKind::MultimodalRegressor)?,
            stacking_regressor: StackingRegressor::from_slice(&store.read_bytes(ArtifactKind::StackingRegressor)?)
                .map_err(|source| StartupError::Model {
                    artifact: ArtifactKind::StackingRegressor,
                    source,
                })?,
        })
    }
}

fn load_pipeline(store: &ArtifactStore, kind: ArtifactKind) -> Result<FittedPipeline, StartupError> {
    let bytes = store.read_bytes(kind)?;
    let json = std::str::from_utf8(&bytes).map_err(|_| StartupError::Encoding { artifact: kind })?;
    FittedPipeline::from_json(json).map_err(|source| StartupError::Pipeline { artifact: kind, source })
}

fn load_regressor(store: &ArtifactStore, kind: ArtifactKind) -> Result<GradientBoostedRegressor, StartupError> {
    let bytes = store.read_bytes(kind)?;
    GradientBoostedRegressor::from_slice(&bytes).map_err(|source| StartupError::Model { artifact: kind, source })
}

pub struct PredictionContext {
    pub(crate) tabular: ColumnRouter,
    pub(crate) tabular_model: GradientBoostedRegressor,
    pub(crate) multimodal: ColumnRouter,
    pub(crate) multimodal_model: GradientBoostedRegressor,
    pub(crate) stacking: StackingRegressor,
    pub(crate) extractor: Arc<ImageFeatureExtractor>,
    pub(crate) temp_dir: Option<PathBuf>,
}

impl std::fmt::Debug for PredictionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionContext")
            .field("tabular_width", &self.tabular.output_width())
            .field("multimodal_width", &self.multimodal.output_width())
            .field("stacking_inputs", &self.stacking.inputs)
            .field("extractor", self.extractor.status())
            .finish()
    }
}

impl PredictionContext {
    /// Load and cross-check every artifact in `store`
    pub fn load(store: &ArtifactStore, extractor: Arc<ImageFeatureExtractor>) -> Result<Self, StartupError> {
        tracing::info!(dir = %store.root().display(), "loading prediction artifacts");
        let context = Self::from_parts(Artifacts::load(store)?, extractor)?;
        tracing::info!(
            tabular_width = context.tabular.output_width(),
            multimodal_width = context.multimodal.output_width(),
            tabular_trees = context.tabular_model.num_trees(),
            multimodal_trees = context.multimodal_model.num_trees(),
            extractor_degraded = context.extractor.is_degraded(),
            "prediction context ready"
        );
        Ok(context)
    }

    /// Assemble a context from already loaded artifacts
    pub fn from_parts(artifacts: Artifacts, extractor: Arc<ImageFeatureExtractor>) -> Result<Self, StartupError> {
        let Artifacts {
            tabular_pipeline,
            tabular_regressor,
            multimodal_pipeline,
            multimodal_regressor,
            stacking_regressor,
        } = artifacts;

        if tabular_pipeline.has_image_group() {
            return Err(StartupError::Mismatch(
                "tabular pipeline must not contain an image group".to_string(),
            ));
        }
        if !multimodal_pipeline.has_image_group() {
            return Err(StartupError::Mismatch(
                "multimodal pipeline has no image group".to_string(),
            ));
        }

        let tabular = ColumnRouter::new(tabular_pipeline).map_err(|source| StartupError::Pipeline {
            artifact: ArtifactKind::TabularPipeline,
            source,
        })?;
        let embedder: Arc<dyn ImageEmbedder> = extractor.clone();
        let multimodal = ColumnRouter::with_embedder(multimodal_pipeline, embedder).map_err(|source| {
            StartupError::Pipeline {
                artifact: ArtifactKind::MultimodalPipeline,
                source,
            }
        })?;

        check_width("tabular", tabular.output_width(), tabular_regressor.num_features())?;
        check_width("multimodal", multimodal.output_width(), multimodal_regressor.num_features())?;
        stacking_regressor
            .validate(multimodal.output_width())
            .map_err(|source| StartupError::Model {
                artifact: ArtifactKind::StackingRegressor,
                source,
            })?;

        Ok(Self {
            tabular,
            tabular_model: tabular_regressor,
            multimodal,
            multimodal_model: multimodal_regressor,
            stacking: stacking_regressor,
            extractor,
            temp_dir: None,
        })
    }

    /// Write per-request temporary images under `dir` instead of the system default
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn tabular_router(&self) -> &ColumnRouter {
        &self.tabular
    }

    pub fn multimodal_router(&self) -> &ColumnRouter {
        &self.multimodal
    }

    pub fn stacking(&self) -> &StackingRegressor {
        &self.stacking
    }

    pub fn extractor(&self) -> &ImageFeatureExtractor {
        &self.extractor
    }
}

fn check_width(name: &str, pipeline: usize, model: usize) -> Result<(), StartupError> {
    if pipeline != model {
        return Err(StartupError::Mismatch(format!(
            "{} pipeline produces {} features but its regressor expects {}",
            name, pipeline, model
        )));
    }
    Ok(())
}
