//! # gemprice Model
//!
//! Inference-only regressors for price prediction:
//!
//! - [`GradientBoostedRegressor`]: a `gbtree` ensemble loaded from XGBoost's
//!   JSON model format
//! - [`LinearRegressor`]: dense linear model
//! - [`StackingRegressor`]: a linear final estimator over upstream
//!   predictions, with an inverse target transform back to price
//!
//! All of them are immutable after loading and safe to share across threads.

pub mod error;
pub mod forest;
pub mod linear;
pub mod regressor;
pub mod stacking;
pub mod tree;
pub mod xgboost;

pub use error::ModelError;
pub use forest::GradientBoostedRegressor;
pub use linear::LinearRegressor;
pub use regressor::Regressor;
pub use stacking::{StackInput, StackingRegressor, TargetTransform, UpstreamPredictions, STACKING_FORMAT_VERSION};
pub use tree::{Node, RegressionTree};
pub use xgboost::XgbModel;
