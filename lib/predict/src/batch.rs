//! Batch input files
//!
//! Offline pricing reads many diamonds from one file. JSON input is either
//! an array of request objects or an object of equal-length columns
//! (`{"Weight": [0.9, 1.15], "Cut": ["EX", "VG"], ...}`). CSV input has one
//! header row naming the fields. Unknown fields are ignored in every format.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use gemprice_core::Column;
use serde::Deserialize;
use thiserror::Error;

use crate::request::{FieldInput, PredictRequest};

#[derive(Error, Debug)]
pub enum BatchInputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON batch: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV batch: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{column}' has {actual} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot infer the input format of {0}, expected a .json or .csv file")]
    UnknownFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl std::str::FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(InputFormat::Json),
            "csv" => Ok(InputFormat::Csv),
            other => Err(format!("unknown input format '{}', expected json or csv", other)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    Rows(Vec<PredictRequest>),
    Columns(BTreeMap<String, Vec<FieldInput>>),
}

/// Read every request in `path`; `format` overrides the extension
pub fn read_requests(path: &Path, format: Option<InputFormat>) -> Result<Vec<PredictRequest>, BatchInputError> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .ok_or_else(|| BatchInputError::UnknownFormat(path.to_path_buf()))?;
    let bytes = std::fs::read(path).map_err(|source| BatchInputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let requests = match format {
        InputFormat::Json => parse_json(&bytes)?,
        InputFormat::Csv => parse_csv(&bytes)?,
    };
    tracing::info!(path = %path.display(), ?format, rows = requests.len(), "read batch input");
    Ok(requests)
}

pub fn parse_json(bytes: &[u8]) -> Result<Vec<PredictRequest>, BatchInputError> {
    match serde_json::from_slice(bytes)? {
        JsonBatch::Rows(rows) => Ok(rows),
        JsonBatch::Columns(columns) => from_columns(columns),
    }
}

fn from_columns(columns: BTreeMap<String, Vec<FieldInput>>) -> Result<Vec<PredictRequest>, BatchInputError> {
    let mut known = Vec::with_capacity(columns.len());
    for (name, values) in columns {
        match name.parse::<Column>() {
            Ok(column) if column != Column::ImagePath => known.push((name, column, values)),
            _ => tracing::debug!(field = %name, "ignoring unknown batch column"),
        }
    }

    let rows = known.first().map_or(0, |(_, _, values)| values.len());
    let mut requests = vec![PredictRequest::new(); rows];

    for (name, column, values) in known {
        if values.len() != rows {
            return Err(BatchInputError::RaggedColumn {
                column: name,
                expected: rows,
                actual: values.len(),
            });
        }
        for (request, value) in requests.iter_mut().zip(values) {
            *request = std::mem::take(request).with(column, value);
        }
    }

    Ok(requests)
}

pub fn parse_csv(bytes: &[u8]) -> Result<Vec<PredictRequest>, BatchInputError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut requests = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: HashMap<String, String> = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        requests.push(PredictRequest::from_fields(fields));
    }
    Ok(requests)
}
