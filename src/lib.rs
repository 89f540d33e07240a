//! # gemprice
//!
//! Gemstone price prediction from tabular attributes and, optionally, a
//! photograph of the stone.
//!
//! ## Pipeline
//!
//! ```text
//! request ─► RawRecord ─► ColumnRouter ─► FeatureVector ─► GradientBoostedRegressor ─► price
//!                              │                                     │
//!                              └─ image_path ─► ResNet-50 (2048)     └─► StackingRegressor ─► exp(x)-1
//! ```
//!
//! - Tabular path: 12 fields, imputed and encoded by the tabular pipeline,
//!   priced by an XGBoost tree ensemble.
//! - Multimodal path: the same fields plus an image embedding, priced by a
//!   second ensemble whose estimate feeds a stacking regressor trained on
//!   `ln(1 + price)`.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! gemprice --artifacts-dir ./artifacts --backbone-weights resnet50.safetensors --http-port 5000
//! curl -X POST localhost:5000/predict/tabular -H 'content-type: application/json' \
//!      -d '{"Weight": 0.9, "Cut": "EX", "Clarity": "VS1", "Shape": "Round"}'
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use gemprice::prelude::*;
//! use std::sync::Arc;
//!
//! let store = ArtifactStore::open("artifacts").unwrap();
//! let extractor = Arc::new(ImageFeatureExtractor::new(ExtractorConfig::default()));
//! let ctx = PredictionContext::load(&store, extractor).unwrap();
//!
//! let request = PredictRequest::new()
//!     .with(Column::Weight, FieldInput::Number(0.9))
//!     .with(Column::Shape, FieldInput::Text("Round".into()));
//! println!("{}", ctx.predict_tabular(request).unwrap().predicted_price);
//! ```
//!
//! ## Crate Structure
//!
//! - `gemprice-core` - records, columns, feature vectors, the embedder trait
//! - `gemprice-schema` - transformers, fitted pipelines, the column router
//! - `gemprice-vision` - ResNet-50 image feature extraction
//! - `gemprice-model` - XGBoost JSON ensembles, linear and stacking regressors
//! - `gemprice-storage` - artifact directory, manifest and checksums
//! - `gemprice-predict` - request validation, context, prediction composer
//! - `gemprice-api` - REST API

// Re-export core types
pub use gemprice_core::{Column, Embedding, Error, FeatureVector, ImageEmbedder, RawRecord, Result, EMBEDDING_DIM};

// Re-export pipelines and models
pub use gemprice_model::{GradientBoostedRegressor, LinearRegressor, Regressor, StackingRegressor};
pub use gemprice_schema::{ColumnRouter, FittedPipeline, PipelineBuilder, PipelineSchema};
pub use gemprice_vision::{ExtractorConfig, ImageFeatureExtractor};

// Re-export storage
pub use gemprice_storage::{ArtifactKind, ArtifactStore};

// Re-export prediction and API
pub use gemprice_api::{RestApi, ServerConfig};
pub use gemprice_predict::{FieldInput, ImageUpload, PredictError, PredictRequest, Prediction, PredictionContext};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArtifactKind, ArtifactStore, Column, ColumnRouter, ExtractorConfig, FieldInput, FittedPipeline,
        GradientBoostedRegressor, ImageFeatureExtractor, ImageUpload, PipelineBuilder, PipelineSchema,
        PredictError, PredictRequest, Prediction, PredictionContext, RawRecord, Regressor, RestApi,
        ServerConfig, StackingRegressor,
    };
}
