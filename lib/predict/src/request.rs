//! Typed prediction requests
//!
//! Callers send the twelve tabular fields as JSON numbers or strings, form
//! fields, or multipart parts. Everything is validated here, at the
//! boundary, before a [`RawRecord`] reaches the pipelines.

use gemprice_core::{Column, Error as CoreError, RawRecord, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PredictError;

/// A field value as sent by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Number(f64),
    Text(String),
}

impl FieldInput {
    fn as_number(&self, column: Column) -> Result<Option<f64>, PredictError> {
        let invalid = |value: String| {
            PredictError::from(CoreError::InvalidNumeric {
                field: column.name().to_string(),
                value,
            })
        };

        match self {
            FieldInput::Number(n) if n.is_finite() => Ok(Some(*n)),
            FieldInput::Number(n) => Err(invalid(n.to_string())),
            FieldInput::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                match t.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(Some(n)),
                    _ => Err(invalid(s.clone())),
                }
            }
        }
    }

    fn into_text(self) -> String {
        match self {
            FieldInput::Text(s) => s,
            // Colour_IsFancy: 0 must match the fitted category "0", not "0.0"
            FieldInput::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
            FieldInput::Number(n) => n.to_string(),
        }
    }
}

/// The twelve tabular fields; absent fields are imputed by the pipelines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(rename = "Weight", default)]
    pub weight: Option<FieldInput>,
    #[serde(rename = "X", default)]
    pub x: Option<FieldInput>,
    #[serde(rename = "Y", default)]
    pub y: Option<FieldInput>,
    #[serde(rename = "Z", default)]
    pub z: Option<FieldInput>,
    #[serde(rename = "Cut", default)]
    pub cut: Option<FieldInput>,
    #[serde(rename = "Polish", default)]
    pub polish: Option<FieldInput>,
    #[serde(rename = "Symmetry", default)]
    pub symmetry: Option<FieldInput>,
    #[serde(rename = "Clarity", default)]
    pub clarity: Option<FieldInput>,
    #[serde(rename = "Colour", default)]
    pub colour: Option<FieldInput>,
    #[serde(rename = "Fluorescence", default)]
    pub fluorescence: Option<FieldInput>,
    #[serde(rename = "Shape", default)]
    pub shape: Option<FieldInput>,
    #[serde(rename = "Colour_IsFancy", default)]
    pub colour_is_fancy: Option<FieldInput>,
}

impl PredictRequest {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, column: Column) -> Option<&mut Option<FieldInput>> {
        Some(match column {
            Column::Weight => &mut self.weight,
            Column::X => &mut self.x,
            Column::Y => &mut self.y,
            Column::Z => &mut self.z,
            Column::Cut => &mut self.cut,
            Column::Polish => &mut self.polish,
            Column::Symmetry => &mut self.symmetry,
            Column::Clarity => &mut self.clarity,
            Column::Colour => &mut self.colour,
            Column::Fluorescence => &mut self.fluorescence,
            Column::Shape => &mut self.shape,
            Column::ColourIsFancy => &mut self.colour_is_fancy,
            Column::ImagePath => return None,
        })
    }

    /// Set a field by column; `image_path` is not a request field
    pub fn set(&mut self, column: Column, value: FieldInput) -> Result<(), PredictError> {
        let slot = self
            .slot(column)
            .ok_or_else(|| PredictError::InvalidInput(format!("field '{}' cannot be set by the caller", column)))?;
        *slot = Some(value);
        Ok(())
    }

    #[must_use]
    pub fn with(mut self, column: Column, value: FieldInput) -> Self {
        let result = self.set(column, value);
        debug_assert!(result.is_ok(), "{:?}", result);
        self
    }

    /// Build from string fields such as multipart form parts; unknown names are ignored
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        let mut request = Self::new();
        for (name, value) in fields {
            match name.parse::<Column>() {
                Ok(column) if column != Column::ImagePath => {
                    let _ = request.set(column, FieldInput::Text(value));
                }
                _ => tracing::debug!(field = %name, "ignoring unknown request field"),
            }
        }
        request
    }

    /// Validate every field and build the raw record
    pub fn into_record(mut self) -> Result<RawRecord, PredictError> {
        let mut record = RawRecord::new();

        for column in Column::TABULAR {
            let value = self.slot(column).and_then(Option::take);
            match column.value_type() {
                ValueType::Numeric => {
                    let number = match &value {
                        Some(v) => v.as_number(column)?,
                        None => None,
                    };
                    record.set_number(column, number)?;
                }
                _ => record.set_text(column, value.map(FieldInput::into_text))?,
            }
        }

        Ok(record)
    }
}
