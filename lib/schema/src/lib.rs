//! # gemprice Schema
//!
//! Preprocessing pipelines that turn raw gemstone records into fixed-width
//! feature vectors.
//!
//! ## Overview
//!
//! A pipeline is an ordered list of column groups. Each group is handled by
//! one transformer and contributes one contiguous block of the output:
//!
//! - **Numeric**: median imputation, then `(x - mean) / std`
//! - **Ordinal**: most-frequent imputation, then the grade's rank in a fixed
//!   table (`-1` for unknown grades)
//! - **Nominal**: most-frequent imputation, then one-hot over the fit-time
//!   vocabulary (all zeros for unseen categories)
//! - **Image**: a 2048-wide embedding from an [`ImageEmbedder`](gemprice_core::ImageEmbedder)
//!
//! ## Fitting and routing
//!
//! ```rust
//! use gemprice_core::{Column, RawRecord};
//! use gemprice_schema::{ColumnRouter, PipelineBuilder, PipelineSchema};
//!
//! let rows = vec![
//!     RawRecord::new()
//!         .with_number(Column::Weight, 0.9)
//!         .with_number(Column::X, 6.1)
//!         .with_number(Column::Y, 6.0)
//!         .with_number(Column::Z, 3.7)
//!         .with_text(Column::Cut, "EX")
//!         .with_text(Column::Polish, "EX")
//!         .with_text(Column::Symmetry, "EX")
//!         .with_text(Column::Clarity, "VS1")
//!         .with_text(Column::Colour, "H")
//!         .with_text(Column::Fluorescence, "M")
//!         .with_text(Column::Shape, "Round"),
//! ];
//!
//! let pipeline = PipelineBuilder::new(PipelineSchema::tabular())
//!     .name("tabular")
//!     .fit(&rows)
//!     .unwrap();
//! let router = ColumnRouter::new(pipeline).unwrap();
//!
//! let features = router.transform(&rows[0]).unwrap();
//! assert_eq!(features.dim(), router.output_width());
//! ```
//!
//! ## Layout
//!
//! ```text
//! ┌──────────┬──────────┬───────────────┬─────────────┐
//! │ numeric  │ ordinal  │ nominal       │ image       │
//! │ 4 scaled │ 5 ranks  │ one-hot block │ 2048 floats │
//! └──────────┴──────────┴───────────────┴─────────────┘
//! ```

pub mod impute;
pub mod nominal;
pub mod numeric;
pub mod ordinal;
pub mod pipeline;
pub mod ranks;
pub mod router;
pub mod schema;

// Re-export main types
pub use nominal::{NominalColumn, NominalTransformer};
pub use numeric::{NumericColumn, NumericTransformer};
pub use ordinal::{OrdinalColumn, OrdinalTransformer};
pub use pipeline::{FittedGroup, FittedPipeline, GroupStep, ImageStep, PipelineBuilder};
pub use ranks::{RankTable, UNKNOWN_RANK};
pub use router::ColumnRouter;
pub use schema::{ColumnGroup, GroupKind, PipelineSchema, SchemaError, PIPELINE_FORMAT_VERSION};
