//! # gemprice Predict
//!
//! The prediction service core: typed requests, the immutable
//! [`PredictionContext`] loaded from an artifact directory, and the two
//! prediction paths.
//!
//! ```rust,no_run
//! use gemprice_predict::{PredictRequest, PredictionContext};
//! use gemprice_storage::ArtifactStore;
//! use gemprice_vision::{ExtractorConfig, ImageFeatureExtractor};
//! use std::sync::Arc;
//!
//! let store = ArtifactStore::open("artifacts").unwrap();
//! let extractor = Arc::new(ImageFeatureExtractor::new(ExtractorConfig::default()));
//! let ctx = PredictionContext::load(&store, extractor).unwrap();
//!
//! let request: PredictRequest = serde_json::from_str(r#"{"Weight": 0.9, "Cut": "EX"}"#).unwrap();
//! let price = ctx.predict_tabular(request).unwrap().predicted_price;
//! ```

pub mod batch;
pub mod composer;
pub mod context;
pub mod error;
pub mod request;
pub mod temp;

pub use batch::{read_requests, BatchInputError, InputFormat};
pub use composer::{ImageUpload, Prediction, MAX_UPLOAD_ALLOC, MAX_UPLOAD_DIMENSION};
pub use context::{Artifacts, PredictionContext};
pub use error::{PredictError, StartupError};
pub use request::{FieldInput, PredictRequest};
pub use temp::TempImage;
