//! Prediction Composer
//!
//! - Tabular: request → tabular router → tabular regressor → price
//! - Multimodal: request + image → temporary file → multimodal router →
//!   multimodal regressor → stacking regressor → inverse transform → price
//!
//! Every stage runs behind a panic guard, so one bad request can only ever
//! produce a [`PredictError`].

use gemprice_core::{FeatureVector, RawRecord};
use gemprice_model::{Regressor, StackInput, UpstreamPredictions};
use image::{DynamicImage, ImageReader, Limits};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use uuid::Uuid;

use crate::context::PredictionContext;
use crate::error::PredictError;
use crate::request::PredictRequest;
use crate::temp::TempImage;

/// Successful prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_price: f64,
}

/// An uploaded image as received from the caller
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Largest accepted width or height of an uploaded image, in pixels
pub const MAX_UPLOAD_DIMENSION: u32 = 6000;

/// Decoder allocation cap for one upload
pub const MAX_UPLOAD_ALLOC: u64 = 256 * 1024 * 1024;

impl ImageUpload {
    /// Decode the upload, sniffing its format and refusing images whose
    /// header declares more pixels than the limits allow
    pub fn decode(&self) -> Result<DynamicImage, PredictError> {
        let invalid = |e: &dyn std::fmt::Display| {
            PredictError::InvalidInput(format!("could not decode image '{}': {}", self.filename, e))
        };

        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_UPLOAD_DIMENSION);
        limits.max_image_height = Some(MAX_UPLOAD_DIMENSION);
        limits.max_alloc = Some(MAX_UPLOAD_ALLOC);

        let mut reader = ImageReader::new(Cursor::new(self.bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| invalid(&e))?;
        reader.limits(limits);
        reader.decode().map_err(|e| invalid(&e))
    }
}

/// Run `f`, turning a panic into a prediction error
fn guarded<T>(stage: &'static str, f: impl FnOnce() -> Result<T, PredictError>) -> Result<T, PredictError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(stage, "panic during prediction");
        Err(PredictError::Prediction(format!("unexpected panic during {}", stage)))
    })
}

fn finite(price: f64) -> Result<Prediction, PredictError> {
    if !price.is_finite() {
        return Err(PredictError::Prediction(format!("non-finite prediction {}", price)));
    }
    Ok(Prediction { predicted_price: price })
}

impl PredictionContext {
    pub fn predict_tabular(&self, request: PredictRequest) -> Result<Prediction, PredictError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("predict", %request_id, mode = "tabular");
        let _enter = span.enter();

        let result = request.into_record().and_then(|record| {
            let price = guarded("tabular prediction", || self.tabular_estimate(&record))?;
            finite(price)
        });
        log_outcome(&result);
        result
    }

    /// Price several tabular requests; the first invalid row fails the batch
    pub fn predict_tabular_batch(&self, requests: Vec<PredictRequest>) -> Result<Vec<Prediction>, PredictError> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("predict_batch", %batch_id, rows = requests.len());
        let _enter = span.enter();

        let records = requests
            .into_iter()
            .enumerate()
            .map(|(row, request)| request.into_record().map_err(|e| e.at_row(row)))
            .collect::<Result<Vec<_>, _>>()?;

        let prices = guarded("tabular batch prediction", || {
            let features = self.tabular.transform_batch(&records)?;
            let rows: Vec<&[f32]> = features.iter().map(FeatureVector::as_slice).collect();
            Ok(self.tabular_model.predict_batch(&rows)?)
        })?;

        let predictions = prices
            .into_iter()
            .enumerate()
            .map(|(row, price)| finite(price).map_err(|e| e.at_row(row)))
            .collect::<Result<Vec<_>, _>>();
        match &predictions {
            Ok(p) => tracing::info!(rows = p.len(), "batch prediction served"),
            Err(e) => tracing::error!(kind = e.kind(), error = %e, "batch prediction failed"),
        }
        predictions
    }

    pub fn predict_multimodal(&self, request: PredictRequest, upload: Option<ImageUpload>) -> Result<Prediction, PredictError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("predict", %request_id, mode = "multimodal");
        let _enter = span.enter();

        let result = self.run_multimodal(request, upload);
        log_outcome(&result);
        result
    }

    fn run_multimodal(&self, request: PredictRequest, upload: Option<ImageUpload>) -> Result<Prediction, PredictError> {
        let upload = upload.ok_or_else(|| {
            PredictError::InvalidInput("No image file provided for multimodal prediction".to_string())
        })?;
        if upload.filename.trim().is_empty() {
            return Err(PredictError::InvalidInput(
                "No selected image file for multimodal prediction".to_string(),
            ));
        }

        let record = request.into_record()?;

        let price = guarded("multimodal prediction", || {
            let image = upload.decode()?;
            let temp = TempImage::write_png(&image, self.temp_dir.as_deref())?;
            let record = record.with_image_path(temp.path());
            self.multimodal_estimate(&record)
        })?;
        finite(price)
    }

    fn tabular_estimate(&self, record: &RawRecord) -> Result<f64, PredictError> {
        let features = self.tabular.transform(record)?;
        tracing::debug!(width = features.dim(), "tabular features");
        Ok(self.tabular_model.predict(features.as_slice())?)
    }

    fn multimodal_estimate(&self, record: &RawRecord) -> Result<f64, PredictError> {
        let features: FeatureVector = self.multimodal.transform(record)?;
        tracing::debug!(width = features.dim(), "multimodal features");

        let upstream = UpstreamPredictions {
            multimodal: Some(self.multimodal_model.predict(features.as_slice())?),
            tabular: if self.stacking.uses(StackInput::Tabular) {
                Some(self.tabular_estimate(record)?)
            } else {
                None
            },
        };

        let transformed = self.stacking.predict_transformed(&upstream, features.as_slice())?;
        tracing::debug!(?upstream, transformed, "stacking estimate");
        Ok(self.stacking.target_transform.inverse(transformed))
    }
}

fn log_outcome(result: &Result<Prediction, PredictError>) {
    match result {
        Ok(p) => tracing::info!(price = p.predicted_price, "prediction served"),
        Err(e) if e.is_client_error() => tracing::warn!(kind = e.kind(), error = %e, "rejected prediction request"),
        Err(e) => tracing::error!(kind = e.kind(), error = %e, "prediction failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Artifacts;
    use gemprice_core::{Column, EMBEDDING_DIM};
    use gemprice_model::{GradientBoostedRegressor, LinearRegressor, StackingRegressor, TargetTransform};
    use gemprice_schema::{PipelineBuilder, PipelineSchema};
    use gemprice_vision::{Backbone, ExtractorConfig, ImageFeatureExtractor, VisionError};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;

    struct OnesBackbone;

    impl Backbone for OnesBackbone {
        fn name(&self) -> &str {
            "ones"
        }

        fn output_dim(&self) -> usize {
            EMBEDDING_DIM
        }

        fn forward(&self, _pixels: Vec<f32>, _size: usize) -> Result<Vec<f32>, VisionError> {
            Ok(vec![1.0; EMBEDDING_DIM])
        }
    }

    fn diamond(weight: f64, cut: &str, clarity: &str, shape: &str) -> RawRecord {
        RawRecord::new()
            .with_number(Column::Weight, weight)
            .with_number(Column::X, weight * 6.0)
            .with_number(Column::Y, weight * 6.0)
            .with_number(Column::Z, weight * 4.0)
            .with_text(Column::Cut, cut)
            .with_text(Column::Polish, cut)
            .with_text(Column::Symmetry, cut)
            .with_text(Column::Clarity, clarity)
            .with_text(Column::Colour, "H")
            .with_text(Column::Fluorescence, "N")
            .with_text(Column::Shape, shape)
    }

    /// Single tree: feature 0 below 0 gives `low`, otherwise `high`
    fn stump(num_features: usize, low: f32, high: f32) -> GradientBoostedRegressor {
        let doc = json!({
            "learner": {
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "gbtree_model_param": {"num_trees": "1"},
                        "trees": [{
                            "tree_param": {"num_nodes": "3", "num_feature": num_features.to_string()},
                            "base_weights": [0.0, low, high],
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [0.0, 0.0, 0.0],
                            "default_left": [1, 0, 0]
                        }]
                    }
                },
                "objective": {"name": "reg:squarederror"},
                "learner_model_param": {"base_score": "0", "num_feature": num_features.to_string()}
            }
        });
        GradientBoostedRegressor::from_slice(doc.to_string().as_bytes()).unwrap()
    }

    fn context(dir: &Path, stacking_inputs: Vec<StackInput>, coefficients: Vec<f64>) -> PredictionContext {
        let rows = vec![
            diamond(0.9, "EX", "VS1", "Round"),
            diamond(1.2, "VG", "SI2", "Cushion"),
            diamond(0.5, "EX", "IF", "Heart"),
            diamond(1.0, "GD", "VS2", "Round"),
        ];
        let tabular = PipelineBuilder::new(PipelineSchema::tabular()).name("tabular").fit(&rows).unwrap();
        let multimodal = PipelineBuilder::new(PipelineSchema::multimodal())
            .name("multimodal")
            .fit(&rows)
            .unwrap();

        let artifacts = Artifacts {
            tabular_regressor: stump(tabular.output_width, 1000.0, 5000.0),
            multimodal_regressor: stump(multimodal.output_width, 7.0, 8.0),
            tabular_pipeline: tabular,
            multimodal_pipeline: multimodal,
            stacking_regressor: StackingRegressor {
                format_version: 1,
                inputs: stacking_inputs,
                passthrough: false,
                final_estimator: LinearRegressor::new(coefficients, 0.0),
                target_transform: TargetTransform::Log1p,
            },
        };

        let extractor = ImageFeatureExtractor::with_backbone(ExtractorConfig::default(), Box::new(OnesBackbone));
        PredictionContext::from_parts(artifacts, Arc::new(extractor))
            .unwrap()
            .with_temp_dir(dir)
    }

    fn request() -> PredictRequest {
        serde_json::from_value(json!({
            "Weight": 1.5, "X": 7.4, "Y": 7.4, "Z": 4.6,
            "Cut": "EX", "Polish": "EX", "Symmetry": "EX",
            "Clarity": "VS1", "Colour": "H", "Fluorescence": "N",
            "Shape": "Round", "Colour_IsFancy": 0
        }))
        .unwrap()
    }

    fn png() -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 200, 210])))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_tabular_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        // weight above the median scales positive, so the stump goes right
        let p = ctx.predict_tabular(request()).unwrap();
        assert_eq!(p.predicted_price, 5000.0);
        assert!(p.predicted_price.is_finite() && p.predicted_price >= 0.0);
    }

    #[test]
    fn test_multimodal_inverse_log() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let p = ctx
            .predict_multimodal(request(), Some(ImageUpload::new("stone.png", png())))
            .unwrap();
        assert!((p.predicted_price - 2980.957987).abs() < 1e-2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stacking_with_tabular_input() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            dir.path(),
            vec![StackInput::Multimodal, StackInput::Tabular],
            vec![0.5, 0.001],
        );
        assert!(ctx.stacking().uses(StackInput::Tabular));

        // 0.5 * 8 + 0.001 * 5000 = 9
        let p = ctx
            .predict_multimodal(request(), Some(ImageUpload::new("stone.png", png())))
            .unwrap();
        assert!((p.predicted_price - 9f64.exp_m1()).abs() < 1e-2);
    }

    #[test]
    fn test_missing_and_unnamed_image() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let err = ctx.predict_multimodal(request(), None).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let err = ctx
            .predict_multimodal(request(), Some(ImageUpload::new("", png())))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_undecodable_upload_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let err = ctx
            .predict_multimodal(request(), Some(ImageUpload::new("stone.jpg", b"not an image".to_vec())))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_oversized_upload_rejected_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image::GrayImage::new(MAX_UPLOAD_DIMENSION + 1, 1))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        let upload = ImageUpload::new("wide.png", bytes.into_inner());

        assert!(matches!(upload.decode(), Err(PredictError::InvalidInput(_))));
        let err = ctx.predict_multimodal(request(), Some(upload)).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_tabular_batch_matches_single_requests() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let light = request().with(Column::Weight, crate::request::FieldInput::Number(0.3));
        let batch = ctx.predict_tabular_batch(vec![request(), light.clone(), PredictRequest::new()]).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], ctx.predict_tabular(request()).unwrap());
        assert_eq!(batch[1], ctx.predict_tabular(light).unwrap());
        assert_eq!(batch[1].predicted_price, 1000.0);
        assert!(ctx.predict_tabular_batch(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_tabular_batch_reports_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let bad = request().with(Column::X, crate::request::FieldInput::Text("wide".into()));
        let err = ctx.predict_tabular_batch(vec![request(), bad]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().starts_with("row 2:"));
    }

    #[test]
    fn test_malformed_numeric_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal], vec![1.0]);

        let bad = request().with(Column::Weight, crate::request::FieldInput::Text("abc".into()));
        assert_eq!(ctx.predict_tabular(bad).unwrap_err().kind(), "invalid_input");
    }

    #[test]
    fn test_overflowing_estimate_is_prediction_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), vec![StackInput::Multimodal, StackInput::Tabular], vec![1.0, 1.0]);

        // ln(1 + price) = 5008 has no finite inverse
        let err = ctx
            .predict_multimodal(request(), Some(ImageUpload::new("stone.png", png())))
            .unwrap_err();
        assert_eq!(err.kind(), "prediction");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_context_rejects_width_mismatch() {
        let rows = vec![diamond(0.9, "EX", "VS1", "Round"), diamond(1.2, "VG", "SI2", "Cushion")];
        let tabular = PipelineBuilder::new(PipelineSchema::tabular()).fit(&rows).unwrap();
        let multimodal = PipelineBuilder::new(PipelineSchema::multimodal()).fit(&rows).unwrap();
        let artifacts = Artifacts {
            tabular_regressor: stump(tabular.output_width + 1, 0.0, 1.0),
            multimodal_regressor: stump(multimodal.output_width, 0.0, 1.0),
            tabular_pipeline: tabular,
            multimodal_pipeline: multimodal,
            stacking_regressor: StackingRegressor {
                format_version: 1,
                inputs: vec![StackInput::Multimodal],
                passthrough: false,
                final_estimator: LinearRegressor::new(vec![1.0], 0.0),
                target_transform: TargetTransform::Log1p,
            },
        };
        let extractor = Arc::new(ImageFeatureExtractor::degraded(ExtractorConfig::default(), "test"));
        assert!(matches!(
            PredictionContext::from_parts(artifacts, extractor),
            Err(crate::error::StartupError::Mismatch(_))
        ));
    }
}
