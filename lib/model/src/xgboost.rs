//! XGBoost JSON model format
//!
//! Foreign types mirroring the document written by `Booster.save_model(...json)`.
//! Only the fields needed to rebuild a `gbtree` regression ensemble are kept;
//! everything else in the document is ignored. XGBoost writes most scalars as
//! strings, hence the `DisplayFromStr` adapters.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};

/// XGBoost writes `base_score` as a number, a string such as `"5E-1"`, or a
/// bracketed vector string such as `"[5E-1]"` depending on the version.
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;

    fn scalar(value: &Value) -> Option<f32> {
        match value {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::Array(items) => items.first().and_then(scalar),
            Value::String(s) => {
                let t = s.trim();
                let inner = t
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .unwrap_or(t);
                inner.split(',').next()?.trim().parse::<f32>().ok()
            }
            _ => None,
        }
    }

    let value = Value::deserialize(deserializer)?;
    scalar(&value).ok_or_else(|| SerdeError::custom(format!("cannot parse base_score from {}", value)))
}

fn default_base_score() -> f32 {
    0.5
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: i64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub num_feature: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbTree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub id: i32,
    pub base_weights: Vec<f32>,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i32>,
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<i32>,
    #[serde(default)]
    pub split_type: Vec<i32>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GBTreeModelParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_trees: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<XgbTree>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
    pub gbtree_model_param: GBTreeModelParam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    /// `gblinear` and `dart` documents parse but cannot be loaded
    #[serde(other)]
    Unsupported,
}

/// Only the objective's name matters for inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
}

impl Objective {
    /// Regression objectives whose prediction is the raw margin
    pub fn is_identity_regression(&self) -> bool {
        matches!(
            self.name.as_str(),
            "reg:squarederror" | "reg:linear" | "reg:pseudohubererror" | "reg:absoluteerror" | "reg:quantileerror"
        )
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score", default = "default_base_score")]
    pub base_score: f32,
    #[serde(rename = "num_feature")]
    #[serde_as(as = "DisplayFromStr")]
    pub n_features: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: Objective,
    pub learner_model_param: LearnerModelParam,
}

/// Top-level XGBoost document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbModel {
    #[serde(default)]
    pub version: Vec<u32>,
    pub learner: Learner,
}

impl XgbModel {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn booster_name(&self) -> &'static str {
        match self.learner.gradient_booster {
            GradientBooster::Gbtree { .. } => "gbtree",
            GradientBooster::Unsupported => "gblinear/dart",
        }
    }
}
