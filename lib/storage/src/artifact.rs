//! Names of the persisted artifacts

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five files a prediction service loads at start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TabularPipeline,
    TabularRegressor,
    MultimodalPipeline,
    MultimodalRegressor,
    StackingRegressor,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::TabularPipeline,
        ArtifactKind::TabularRegressor,
        ArtifactKind::MultimodalPipeline,
        ArtifactKind::MultimodalRegressor,
        ArtifactKind::StackingRegressor,
    ];

    pub fn stem(&self) -> &'static str {
        match self {
            ArtifactKind::TabularPipeline => "tabular_pipeline",
            ArtifactKind::TabularRegressor => "tabular_regressor",
            ArtifactKind::MultimodalPipeline => "multimodal_pipeline",
            ArtifactKind::MultimodalRegressor => "multimodal_regressor",
            ArtifactKind::StackingRegressor => "stacking_regressor",
        }
    }

    /// Plain JSON file name
    pub fn file_name(&self) -> String {
        format!("{}.json", self.stem())
    }

    /// Gzip-compressed JSON file name
    pub fn gz_file_name(&self) -> String {
        format!("{}.json.gz", self.stem())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}
