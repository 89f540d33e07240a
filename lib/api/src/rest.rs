use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::error::{BlockingError, InternalError};
use actix_web::{web, App, Either, HttpResponse, HttpServer, Result as ActixResult};
use futures_util::StreamExt;
use gemprice_predict::{ImageUpload, PredictError, PredictRequest, Prediction, PredictionContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the multipart part carrying the image
pub const IMAGE_FIELD: &str = "image";

const TABULAR_ERROR: &str = "There was a problem processing your tabular input. Please check your input.";
const MULTIMODAL_ERROR: &str = "Error processing multimodal prediction";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP worker threads, actix's default when `None`
    pub workers: Option<usize>,
    /// Largest accepted image part, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            workers: None,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    pub kind: String,
}

#[derive(Serialize)]
struct HealthInfo<'a> {
    status: &'static str,
    extractor: &'a gemprice_vision::ExtractorStatus,
    tabular_width: usize,
    multimodal_width: usize,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(ctx: Arc<PredictionContext>, config: ServerConfig) -> std::io::Result<()> {
        tracing::info!(host = %config.host, port = config.port, "starting REST API");

        let upload_limit = config.max_upload_bytes;
        let mut server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(ctx.clone()))
                .app_data(web::Data::new(UploadLimit(upload_limit)))
                .configure(RestApi::routes)
        });
        if let Some(workers) = config.workers {
            server = server.workers(workers);
        }

        server.bind((config.host.as_str(), config.port))?.run().await
    }

    /// Register the routes and their extractor configuration
    pub fn routes(cfg: &mut web::ServiceConfig) {
        cfg.app_data(json_config())
            .app_data(form_config())
            .route("/health", web::get().to(health))
            .route("/predict/tabular", web::post().to(predict_tabular))
            .route("/predict/multimodal", web::post().to(predict_multimodal));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

impl Default for UploadLimit {
    fn default() -> Self {
        UploadLimit(ServerConfig::default().max_upload_bytes)
    }
}

fn bad_request(details: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorBody {
        error: "Invalid input".to_string(),
        details,
        kind: "invalid_input".to_string(),
    })
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        InternalError::from_response(err, response).into()
    })
}

fn form_config() -> web::FormConfig {
    web::FormConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        InternalError::from_response(err, response).into()
    })
}

fn respond(route_error: &str, result: Result<Result<Prediction, PredictError>, BlockingError>) -> HttpResponse {
    match result {
        Ok(Ok(prediction)) => HttpResponse::Ok().json(prediction),
        Ok(Err(e)) if e.is_client_error() => bad_request(e.to_string()),
        Ok(Err(e)) => HttpResponse::InternalServerError().json(ErrorBody {
            error: route_error.to_string(),
            details: e.to_string(),
            kind: e.kind().to_string(),
        }),
        Err(e) => {
            tracing::error!(error = %e, "prediction task did not complete");
            HttpResponse::InternalServerError().json(ErrorBody {
                error: route_error.to_string(),
                details: e.to_string(),
                kind: "prediction".to_string(),
            })
        }
    }
}

async fn health(ctx: web::Data<Arc<PredictionContext>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(HealthInfo {
        status: if ctx.extractor().is_degraded() { "degraded" } else { "ok" },
        extractor: ctx.extractor().status(),
        tabular_width: ctx.tabular_router().output_width(),
        multimodal_width: ctx.multimodal_router().output_width(),
    }))
}

async fn predict_tabular(
    ctx: web::Data<Arc<PredictionContext>>,
    body: Either<web::Json<PredictRequest>, web::Form<PredictRequest>>,
) -> ActixResult<HttpResponse> {
    let request = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };

    let ctx = ctx.get_ref().clone();
    let result = web::block(move || ctx.predict_tabular(request)).await;
    Ok(respond(TABULAR_ERROR, result))
}

async fn predict_multimodal(
    ctx: web::Data<Arc<PredictionContext>>,
    limit: Option<web::Data<UploadLimit>>,
    payload: Multipart,
) -> ActixResult<HttpResponse> {
    let limit = limit.map(|l| *l.get_ref()).unwrap_or_default();
    let (fields, upload) = match read_form(payload, limit.0).await {
        Ok(parts) => parts,
        Err(details) => {
            tracing::warn!(%details, "rejected multipart body");
            return Ok(bad_request(details));
        }
    };

    let request = PredictRequest::from_fields(fields);
    let ctx = ctx.get_ref().clone();
    let result = web::block(move || ctx.predict_multimodal(request, upload)).await;
    Ok(respond(MULTIMODAL_ERROR, result))
}

/// Collect text parts and the optional image part of a multipart body
async fn read_form(
    mut payload: Multipart,
    max_upload_bytes: usize,
) -> Result<(HashMap<String, String>, Option<ImageUpload>), String> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| format!("malformed multipart body: {}", e))?;
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| format!("malformed multipart body: {}", e))?;
            if data.len() + chunk.len() > max_upload_bytes {
                return Err(format!("part '{}' exceeds the {} byte limit", name, max_upload_bytes));
            }
            data.extend_from_slice(&chunk);
        }

        if name == IMAGE_FIELD {
            upload = Some(ImageUpload::new(filename.unwrap_or_default(), data));
        } else {
            let value = String::from_utf8(data).map_err(|_| format!("field '{}' is not valid UTF-8", name))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, upload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use gemprice_core::{Column, RawRecord, EMBEDDING_DIM};
    use gemprice_model::{GradientBoostedRegressor, LinearRegressor, StackInput, StackingRegressor, TargetTransform};
    use gemprice_predict::Artifacts;
    use gemprice_schema::{PipelineBuilder, PipelineSchema};
    use gemprice_vision::{ExtractorConfig, ImageFeatureExtractor};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use serde_json::json;
    use std::io::Cursor;

    const BOUNDARY: &str = "gempriceboundary";

    fn constant_model(num_features: usize, value: f32) -> GradientBoostedRegressor {
        let doc = json!({
            "learner": {
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "gbtree_model_param": {"num_trees": "1"},
                        "trees": [{
                            "tree_param": {"num_nodes": "1"},
                            "base_weights": [value],
                            "left_children": [-1],
                            "right_children": [-1],
                            "split_indices": [0],
                            "split_conditions": [0.0],
                            "default_left": [0]
                        }]
                    }
                },
                "objective": {"name": "reg:squarederror"},
                "learner_model_param": {"base_score": "0", "num_feature": num_features.to_string()}
            }
        });
        GradientBoostedRegressor::from_slice(doc.to_string().as_bytes()).unwrap()
    }

    fn context(temp_dir: &std::path::Path) -> Arc<PredictionContext> {
        let rows: Vec<RawRecord> = ["Round", "Heart", "Round"]
            .iter()
            .enumerate()
            .map(|(i, shape)| {
                RawRecord::new()
                    .with_number(Column::Weight, 0.5 + i as f64)
                    .with_number(Column::X, 5.0)
                    .with_number(Column::Y, 5.0)
                    .with_number(Column::Z, 3.0)
                    .with_text(Column::Cut, "EX")
                    .with_text(Column::Polish, "VG")
                    .with_text(Column::Symmetry, "EX")
                    .with_text(Column::Clarity, "VS2")
                    .with_text(Column::Colour, "G")
                    .with_text(Column::Fluorescence, "N")
                    .with_text(Column::Shape, *shape)
            })
            .collect();
        let tabular = PipelineBuilder::new(PipelineSchema::tabular()).fit(&rows).unwrap();
        let multimodal = PipelineBuilder::new(PipelineSchema::multimodal()).fit(&rows).unwrap();

        let artifacts = Artifacts {
            tabular_regressor: constant_model(tabular.output_width, 4200.0),
            multimodal_regressor: constant_model(multimodal.output_width, 8.0),
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
        // degraded extractor: every image embeds to zeros
        let extractor = Arc::new(ImageFeatureExtractor::degraded(ExtractorConfig::default(), "no weights in tests"));
        assert_eq!(extractor.config().output_dim, EMBEDDING_DIM);
        Arc::new(
            PredictionContext::from_parts(artifacts, extractor)
                .unwrap()
                .with_temp_dir(temp_dir),
        )
    }

    fn multipart(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn png() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    macro_rules! app {
        ($ctx:expr) => {
            test::init_service(App::new().app_data(web::Data::new($ctx)).configure(RestApi::routes)).await
        };
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(context(dir.path()));

        let resp: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp["status"], "degraded");
        assert_eq!(resp["extractor"]["state"], "degraded");
    }

    #[actix_web::test]
    async fn test_tabular_json_and_form() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(context(dir.path()));

        let req = test::TestRequest::post()
            .uri("/predict/tabular")
            .set_json(json!({"Weight": 1.0, "Cut": "EX", "Shape": "Round", "Colour_IsFancy": 0}))
            .to_request();
        let resp: Prediction = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.predicted_price, 4200.0);

        let req = test::TestRequest::post()
            .uri("/predict/tabular")
            .set_form([("Weight", "1.0"), ("Shape", "Oval")])
            .to_request();
        let resp: Prediction = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.predicted_price, 4200.0);
    }

    #[actix_web::test]
    async fn test_tabular_malformed_numeric_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(context(dir.path()));

        let req = test::TestRequest::post()
            .uri("/predict/tabular")
            .set_json(json!({"Weight": "heavy"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.kind, "invalid_input");
        assert!(body.details.contains("Weight"));
    }

    #[actix_web::test]
    async fn test_multimodal_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(context(dir.path()));

        let image = png();
        let req = test::TestRequest::post()
            .uri("/predict/multimodal")
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart(&[("Weight", "1.2"), ("Shape", "Heart")], Some(("stone.png", image.as_slice()))))
            .to_request();
        let resp: Prediction = test::call_and_read_body_json(&app, req).await;
        assert!((resp.predicted_price - 8f64.exp_m1()).abs() < 1e-2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_multimodal_image_errors_are_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(context(dir.path()));

        let image = png();
        for body in [
            multipart(&[("Weight", "1.2")], None),
            multipart(&[("Weight", "1.2")], Some(("", image.as_slice()))),
            multipart(&[("Weight", "1.2")], Some(("stone.png", &b"garbage"[..]))),
        ] {
            let req = test::TestRequest::post()
                .uri("/predict/multimodal")
                .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
                .set_payload(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 400);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_upload_limit() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(context(dir.path())))
                .app_data(web::Data::new(UploadLimit(16)))
                .configure(RestApi::routes),
        )
        .await;

        let image = png();
        let req = test::TestRequest::post()
            .uri("/predict/multimodal")
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(multipart(&[], Some(("stone.png", image.as_slice()))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
