//! Ordinal rank tables
//!
//! Each table is a total order over the grades of one ordinal attribute,
//! lowest grade first. Encoders map a grade to its zero-based position.

use gemprice_core::Column;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;

/// Encoding emitted for a grade that is not in its table
pub const UNKNOWN_RANK: f32 = -1.0;

/// Shared order for Cut, Polish and Symmetry
pub const QUALITY_ORDER_COMMON: &[&str] = &["F", "GD", "VG", "EX"];

pub const CLARITY_ORDER: &[&str] = &["I2", "I1", "SI2", "SI1", "VS2", "VS1", "VVS2", "VVS1", "IF"];

pub const COLOUR_ORDER: &[&str] = &[
    "Y-Z", "W-X", "U-V", "S-T", "Q-R", "O-P", "N", "M", "L", "K", "J", "I", "H", "G", "F", "E", "D",
];

/// A named, ordered list of categories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankTable {
    pub name: String,
    pub categories: Vec<String>,
}

impl RankTable {
    pub fn new(name: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            name: name.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn quality_order_common() -> Self {
        Self::new("quality_order_common", QUALITY_ORDER_COMMON)
    }

    pub fn clarity_order() -> Self {
        Self::new("clarity_order", CLARITY_ORDER)
    }

    pub fn colour_order() -> Self {
        Self::new("colour_order", COLOUR_ORDER)
    }

    /// Look up a built-in table by name
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "quality_order_common" => Some(Self::quality_order_common()),
            "clarity_order" => Some(Self::clarity_order()),
            "colour_order" => Some(Self::colour_order()),
            _ => None,
        }
    }

    /// The table an ordinal column is encoded with
    pub fn for_column(column: Column) -> Option<Self> {
        match column {
            Column::Cut | Column::Polish | Column::Symmetry => Some(Self::quality_order_common()),
            Column::Clarity => Some(Self::clarity_order()),
            Column::Colour => Some(Self::colour_order()),
            _ => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Zero-based rank of `value`, or `None` if the grade is not in the table
    pub fn rank(&self, value: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == value)
    }

    /// Rank as a feature value, [`UNKNOWN_RANK`] for unseen grades
    pub fn encode(&self, value: &str) -> f32 {
        self.rank(value).map(|r| r as f32).unwrap_or(UNKNOWN_RANK)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.categories.is_empty() {
            return Err(SchemaError::InvalidRankTable(format!("table '{}' is empty", self.name)));
        }
        for (i, category) in self.categories.iter().enumerate() {
            if self.categories[..i].contains(category) {
                return Err(SchemaError::InvalidRankTable(format!(
                    "table '{}' lists '{}' twice",
                    self.name, category
                )));
            }
        }
        Ok(())
    }
}
