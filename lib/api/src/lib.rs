//! # gemprice API
//!
//! HTTP boundary of the prediction service.
//!
//! | Route | Body | Response |
//! |-------|------|----------|
//! | `GET /health` | | extractor status and pipeline widths |
//! | `POST /predict/tabular` | JSON or form fields | `{"predicted_price": f64}` |
//! | `POST /predict/multimodal` | multipart fields + `image` part | `{"predicted_price": f64}` |
//!
//! Failures return `{"error", "details", "kind"}` with status 400 for invalid
//! input and 500 otherwise.

pub mod rest;

pub use rest::{ErrorBody, RestApi, ServerConfig, UploadLimit, IMAGE_FIELD};
