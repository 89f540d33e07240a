//! Error taxonomy of the prediction service

use gemprice_core::Error as CoreError;
use gemprice_model::ModelError;
use gemprice_schema::SchemaError;
use gemprice_storage::{ArtifactKind, StorageError};
use thiserror::Error;

/// Per-request failure, reported to the caller
#[derive(Error, Debug)]
pub enum PredictError {
    /// Missing image, empty filename, malformed numeric field, undecodable upload
    #[error("{0}")]
    InvalidInput(String),

    /// Feature width or ordering disagrees with what a model was fitted on
    #[error("pipeline mismatch: {0}")]
    PipelineMismatch(String),

    /// Any other failure while transforming or predicting
    #[error("prediction failed: {0}")]
    Prediction(String),
}

impl PredictError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidInput(_) => "invalid_input",
            PredictError::PipelineMismatch(_) => "pipeline_mismatch",
            PredictError::Prediction(_) => "prediction",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::InvalidInput(_))
    }

    /// Prefix the message with a 1-based batch row, keeping the kind
    pub fn at_row(self, row: usize) -> Self {
        match self {
            PredictError::InvalidInput(m) => PredictError::InvalidInput(format!("row {}: {}", row + 1, m)),
            PredictError::PipelineMismatch(m) => PredictError::PipelineMismatch(format!("row {}: {}", row + 1, m)),
            PredictError::Prediction(m) => PredictError::Prediction(format!("row {}: {}", row + 1, m)),
        }
    }
}

impl From<CoreError> for PredictError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidNumeric { .. } | CoreError::UnknownColumn(_) => PredictError::InvalidInput(e.to_string()),
            CoreError::FeatureMismatch { .. } => PredictError::PipelineMismatch(e.to_string()),
            other => PredictError::Prediction(other.to_string()),
        }
    }
}

impl From<SchemaError> for PredictError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::Core(core) => core.into(),
            SchemaError::FeatureMismatch(_) | SchemaError::EmbedderDim { .. } => {
                PredictError::PipelineMismatch(e.to_string())
            }
            other => PredictError::Prediction(other.to_string()),
        }
    }
}

impl From<ModelError> for PredictError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::FeatureCount { .. } | ModelError::CoefficientCount { .. } => {
                PredictError::PipelineMismatch(e.to_string())
            }
            other => PredictError::Prediction(other.to_string()),
        }
    }
}

/// Failure while building the prediction context; fatal for the service
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Artifact '{artifact}' is not valid UTF-8")]
    Encoding { artifact: ArtifactKind },

    #[error("Artifact '{artifact}' is not a valid pipeline: {source}")]
    Pipeline {
        artifact: ArtifactKind,
        #[source]
        source: SchemaError,
    },

    #[error("Artifact '{artifact}' is not a valid model: {source}")]
    Model {
        artifact: ArtifactKind,
        #[source]
        source: ModelError,
    },

    #[error("Artifacts do not fit together: {0}")]
    Mismatch(String),
}
