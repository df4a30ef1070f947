#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset_paths;
pub mod config;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod models;
pub mod selection;

pub use config::ExportConfig;
pub use engine::{LayeredStage, Stage};
pub use error::{ExportError, ExportResult};
pub use exporter::{ExportRequest, MaterialExporter};
pub use models::{ExportReport, PathMode};
