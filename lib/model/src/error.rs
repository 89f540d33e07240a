//! Error types for regressor loading and inference

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Malformed model JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported booster '{0}', only gbtree models can be loaded")]
    UnsupportedBooster(String),

    #[error("Unsupported objective '{0}', only identity-link regression objectives can be loaded")]
    UnsupportedObjective(String),

    #[error("Tree {0} has no nodes")]
    EmptyTree(usize),

    #[error("Tree {tree} is malformed: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("Invalid node index in tree {tree}: node {node} references child {child} but tree has {num_nodes} nodes")]
    InvalidNodeIndex {
        tree: usize,
        node: usize,
        child: i32,
        num_nodes: usize,
    },

    #[error("Tree {tree} node {node} splits on feature {feature} but the model has {num_features} features")]
    FeatureIndex {
        tree: usize,
        node: usize,
        feature: i32,
        num_features: usize,
    },

    #[error("Tree {tree} node {node} uses a categorical split, which is not supported")]
    CategoricalSplit { tree: usize, node: usize },

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Stacking estimator has {actual} coefficients but its declared inputs need {expected}")]
    CoefficientCount { expected: usize, actual: usize },

    #[error("Stacking input '{0}' was not provided")]
    MissingInput(&'static str),

    #[error("Stacking regressor declares no inputs")]
    NoInputs,

    #[error("Unsupported stacking format version {0}")]
    UnsupportedVersion(u32),

    #[error("Model produced a non-finite prediction")]
    NonFinite,
}
