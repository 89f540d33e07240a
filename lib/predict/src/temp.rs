//! Per-request temporary image file
//!
//! The multimodal pipeline reads images by path, so an upload is written to
//! a named temporary file for the duration of one request. The file is
//! removed when the guard drops, on every exit path including unwinding.

use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::error::PredictError;

pub struct TempImage {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl TempImage {
    /// Write `image` as PNG into a fresh temporary file under `dir`, or the
    /// system temporary directory when `dir` is `None`
    pub fn write_png(image: &DynamicImage, dir: Option<&Path>) -> Result<Self, PredictError> {
        let mut builder = Builder::new();
        builder.prefix("gemprice-").suffix(".png");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| PredictError::Prediction(format!("failed to create temporary image file: {}", e)))?;

        image
            .write_to(file.as_file_mut(), ImageFormat::Png)
            .map_err(|e| PredictError::Prediction(format!("failed to write temporary image file: {}", e)))?;

        let path = file.path().to_path_buf();
        tracing::debug!(path = %path.display(), "saved upload to temporary file");
        Ok(Self { file: Some(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match file.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed temporary image file"),
            Err(e) => tracing::error!(path = %self.path.display(), error = %e, "failed to remove temporary image file"),
        }
    }
}
