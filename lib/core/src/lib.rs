//! # gemprice Core
//!
//! Core types shared by every gemprice crate.
//!
//! - [`RawRecord`] - one row of raw gemstone attributes, with typed optional fields
//! - [`Column`] - the closed set of input columns and their wire names
//! - [`FeatureVector`] - the fixed-width numeric row fed to a regressor
//! - [`ImageEmbedder`] - the seam between the preprocessing pipeline and image models
//!
//! ## Example
//!
//! ```rust
//! use gemprice_core::{Column, RawRecord};
//!
//! let record = RawRecord::new()
//!     .with_number(Column::Weight, 0.9)
//!     .with_text(Column::Cut, "EX");
//!
//! assert_eq!(record.number(Column::Weight).unwrap(), Some(0.9));
//! assert_eq!(record.text(Column::Shape).unwrap(), None);
//! ```

pub mod embedder;
pub mod error;
pub mod record;
pub mod vector;

pub use embedder::ImageEmbedder;
pub use error::{Error, Result};
pub use record::{Column, FieldValue, RawRecord, ValueType};
pub use vector::{Embedding, FeatureVector, EMBEDDING_DIM};
