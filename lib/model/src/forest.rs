//! Gradient-boosted tree ensemble regressor

use crate::error::ModelError;
use crate::regressor::{check_features, Regressor};
use crate::tree::RegressionTree;
use crate::xgboost::{GradientBooster, XgbModel};

/// Sum of tree leaves on top of a base score
#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    trees: Vec<RegressionTree>,
    base_score: f64,
    num_features: usize,
    objective: String,
    feature_names: Vec<String>,
}

impl GradientBoostedRegressor {
    /// Parse and convert an XGBoost JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        Self::from_xgboost(&XgbModel::from_slice(bytes)?)
    }

    pub fn from_xgboost(model: &XgbModel) -> Result<Self, ModelError> {
        let learner = &model.learner;

        let GradientBooster::Gbtree { model: trees } = &learner.gradient_booster else {
            return Err(ModelError::UnsupportedBooster(model.booster_name().to_string()));
        };
        if !learner.objective.is_identity_regression() {
            return Err(ModelError::UnsupportedObjective(learner.objective.name.clone()));
        }

        let declared = trees.gbtree_model_param.num_trees.max(0) as usize;
        if declared != trees.trees.len() {
            return Err(ModelError::MalformedTree {
                tree: trees.trees.len(),
                reason: format!("model declares {} trees but contains {}", declared, trees.trees.len()),
            });
        }

        let num_features = learner.learner_model_param.n_features.max(0) as usize;
        let converted = trees
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| RegressionTree::from_xgboost(t, i, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees: converted,
            // identity link: the stored base score is already a margin
            base_score: learner.learner_model_param.base_score as f64,
            num_features,
            objective: learner.objective.name.clone(),
            feature_names: learner.feature_names.clone(),
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Feature names recorded at training time, empty if none were given
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

impl Regressor for GradientBoostedRegressor {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict(&self, features: &[f32]) -> Result<f64, ModelError> {
        check_features(self.num_features, features)?;

        let margin = self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.leaf_value(features) as f64);

        if !margin.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(margin)
    }
}
