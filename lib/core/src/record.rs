//! Raw gemstone records
//!
//! A [`RawRecord`] is one row of raw attributes as received from a caller.
//! Every column the pipelines know about is named by [`Column`], which also
//! carries the exact wire name used in requests and persisted pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Value type a column holds before preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Numeric,
    Categorical,
    ImagePath,
}

/// A named input column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "Weight")]
    Weight,
    #[serde(rename = "X")]
    X,
    #[serde(rename = "Y")]
    Y,
    #[serde(rename = "Z")]
    Z,
    #[serde(rename = "Cut")]
    Cut,
    #[serde(rename = "Polish")]
    Polish,
    #[serde(rename = "Symmetry")]
    Symmetry,
    #[serde(rename = "Clarity")]
    Clarity,
    #[serde(rename = "Colour")]
    Colour,
    #[serde(rename = "Fluorescence")]
    Fluorescence,
    #[serde(rename = "Shape")]
    Shape,
    #[serde(rename = "Colour_IsFancy")]
    ColourIsFancy,
    #[serde(rename = "image_path")]
    ImagePath,
}

impl Column {
    /// The twelve tabular columns, in request order
    pub const TABULAR: [Column; 12] = [
        Column::Weight,
        Column::X,
        Column::Y,
        Column::Z,
        Column::Cut,
        Column::Polish,
        Column::Symmetry,
        Column::Clarity,
        Column::Colour,
        Column::Fluorescence,
        Column::Shape,
        Column::ColourIsFancy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Weight => "Weight",
            Column::X => "X",
            Column::Y => "Y",
            Column::Z => "Z",
            Column::Cut => "Cut",
            Column::Polish => "Polish",
            Column::Symmetry => "Symmetry",
            Column::Clarity => "Clarity",
            Column::Colour => "Colour",
            Column::Fluorescence => "Fluorescence",
            Column::Shape => "Shape",
            Column::ColourIsFancy => "Colour_IsFancy",
            Column::ImagePath => "image_path",
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Column::Weight | Column::X | Column::Y | Column::Z => ValueType::Numeric,
            Column::ImagePath => ValueType::ImagePath,
            _ => ValueType::Categorical,
        }
    }

    /// Raw fallback shown for an absent field: `0.0`, `""`, or `"0"` for the fancy flag
    pub fn default_raw(&self) -> &'static str {
        match self.value_type() {
            ValueType::Numeric => "0.0",
            ValueType::Categorical if *self == Column::ColourIsFancy => "0",
            _ => "",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Column::TABULAR
            .iter()
            .chain(std::iter::once(&Column::ImagePath))
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| Error::UnknownColumn(s.to_string()))
    }
}

/// Borrowed view of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(Option<f64>),
    Text(Option<&'a str>),
    Path(Option<&'a Path>),
}

/// One raw gemstone row
///
/// `None` means the caller did not provide the field. Numeric and categorical
/// `None`s are imputed by the pipeline; the fancy-colour flag falls back to `"0"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Weight", default)]
    pub weight: Option<f64>,
    #[serde(rename = "X", default)]
    pub x: Option<f64>,
    #[serde(rename = "Y", default)]
    pub y: Option<f64>,
    #[serde(rename = "Z", default)]
    pub z: Option<f64>,
    #[serde(rename = "Cut", default)]
    pub cut: Option<String>,
    #[serde(rename = "Polish", default)]
    pub polish: Option<String>,
    #[serde(rename = "Symmetry", default)]
    pub symmetry: Option<String>,
    #[serde(rename = "Clarity", default)]
    pub clarity: Option<String>,
    #[serde(rename = "Colour", default)]
    pub colour: Option<String>,
    #[serde(rename = "Fluorescence", default)]
    pub fluorescence: Option<String>,
    #[serde(rename = "Shape", default)]
    pub shape: Option<String>,
    #[serde(rename = "Colour_IsFancy", default)]
    pub colour_is_fancy: Option<String>,
    #[serde(rename = "image_path", default)]
    pub image_path: Option<PathBuf>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: Column) -> FieldValue<'_> {
        match column {
            Column::Weight => FieldValue::Number(self.weight),
            Column::X => FieldValue::Number(self.x),
            Column::Y => FieldValue::Number(self.y),
            Column::Z => FieldValue::Number(self.z),
            Column::Cut => FieldValue::Text(self.cut.as_deref()),
            Column::Polish => FieldValue::Text(self.polish.as_deref()),
            Column::Symmetry => FieldValue::Text(self.symmetry.as_deref()),
            Column::Clarity => FieldValue::Text(self.clarity.as_deref()),
            Column::Colour => FieldValue::Text(self.colour.as_deref()),
            Column::Fluorescence => FieldValue::Text(self.fluorescence.as_deref()),
            Column::Shape => FieldValue::Text(self.shape.as_deref()),
            Column::ColourIsFancy => {
                FieldValue::Text(Some(self.colour_is_fancy.as_deref().unwrap_or("0")))
            }
            Column::ImagePath => FieldValue::Path(self.image_path.as_deref()),
        }
    }

    /// Numeric cell; NaN is reported as missing
    pub fn number(&self, column: Column) -> Result<Option<f64>> {
        match self.get(column) {
            FieldValue::Number(v) => Ok(v.filter(|x| !x.is_nan())),
            _ => Err(Error::ColumnType {
                column: column.name().to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Categorical cell; an empty or blank string is reported as missing
    pub fn text(&self, column: Column) -> Result<Option<&str>> {
        match self.get(column) {
            FieldValue::Text(v) => Ok(v.filter(|s| !s.trim().is_empty())),
            _ => Err(Error::ColumnType {
                column: column.name().to_string(),
                expected: "categorical",
            }),
        }
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn set_number(&mut self, column: Column, value: Option<f64>) -> Result<()> {
        let slot = match column {
            Column::Weight => &mut self.weight,
            Column::X => &mut self.x,
            Column::Y => &mut self.y,
            Column::Z => &mut self.z,
            _ => {
                return Err(Error::ColumnType {
                    column: column.name().to_string(),
                    expected: "numeric",
                })
            }
        };
        *slot = value;
        Ok(())
    }

    pub fn set_text(&mut self, column: Column, value: Option<String>) -> Result<()> {
        let slot = match column {
            Column::Cut => &mut self.cut,
            Column::Polish => &mut self.polish,
            Column::Symmetry => &mut self.symmetry,
            Column::Clarity => &mut self.clarity,
            Column::Colour => &mut self.colour,
            Column::Fluorescence => &mut self.fluorescence,
            Column::Shape => &mut self.shape,
            Column::ColourIsFancy => &mut self.colour_is_fancy,
            _ => {
                return Err(Error::ColumnType {
                    column: column.name().to_string(),
                    expected: "categorical",
                })
            }
        };
        *slot = value;
        Ok(())
    }

    #[must_use]
    pub fn with_number(mut self, column: Column, value: f64) -> Self {
        let result = self.set_number(column, Some(value));
        debug_assert!(result.is_ok(), "with_number on {}: {:?}", column, result);
        self
    }

    #[must_use]
    pub fn with_text(mut self, column: Column, value: impl Into<String>) -> Self {
        let result = self.set_text(column, Some(value.into()));
        debug_assert!(result.is_ok(), "with_text on {}: {:?}", column, result);
        self
    }

    #[must_use]
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Raw value rendered for logs, with absent fields shown as their fallback
    pub fn display_value(&self, column: Column) -> String {
        match self.get(column) {
            FieldValue::Number(Some(v)) => v.to_string(),
            FieldValue::Text(Some(s)) => s.to_string(),
            FieldValue::Path(Some(p)) => p.display().to_string(),
            _ => column.default_raw().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_roundtrip() {
        for column in Column::TABULAR {
            assert_eq!(column.name().parse::<Column>().unwrap(), column);
        }
        assert_eq!("image_path".parse::<Column>().unwrap(), Column::ImagePath);
        assert!(matches!("Depth".parse::<Column>(), Err(Error::UnknownColumn(_))));
    }

    #[test]
    fn test_missing_fields() {
        let record = RawRecord::new().with_text(Column::Cut, "  ");
        assert_eq!(record.number(Column::Weight).unwrap(), None);
        assert_eq!(record.text(Column::Cut).unwrap(), None);
        assert_eq!(record.text(Column::ColourIsFancy).unwrap(), Some("0"));
        assert_eq!(record.display_value(Column::Weight), "0.0");
        assert_eq!(record.display_value(Column::Shape), "");
    }

    #[test]
    fn test_nan_is_missing() {
        let record = RawRecord::new().with_number(Column::X, f64::NAN);
        assert_eq!(record.number(Column::X).unwrap(), None);
    }

    #[test]
    fn test_type_checks() {
        let record = RawRecord::new();
        assert!(matches!(
            record.number(Column::Cut),
            Err(Error::ColumnType { expected: "numeric", .. })
        ));
        assert!(record.text(Column::Weight).is_err());

        let mut record = RawRecord::new();
        assert!(record.set_text(Column::Z, Some("1".into())).is_err());
        assert!(record.set_number(Column::Shape, Some(1.0)).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "with_number on Shape")]
    fn test_builder_rejects_wrong_column_type() {
        let _ = RawRecord::new().with_number(Column::Shape, 1.0);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let record = RawRecord::new()
            .with_number(Column::Weight, 0.9)
            .with_text(Column::ColourIsFancy, "1");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Weight"], 0.9);
        assert_eq!(json["Colour_IsFancy"], "1");
    }
}
