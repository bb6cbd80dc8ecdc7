//! Comfort Insights - Batch analytics over comfort-food survey responses
//!
//! Turns cleaned survey records into classified, scored and aggregated tables
//! through a deterministic pipeline: weight percentiles → per-record
//! classification → alignment scoring → aggregate views.
//!
//! ## Modules
//!
//! - **Schema**: Parse and validate the respondent and comfort-food datasets
//! - **Classifier / Scorer**: Per-record weight-perception, calorie-awareness
//!   and alignment labels
//! - **Aggregator**: Group-by views over the scored table
//! - **Encoder**: JSON / NDJSON export of a pipeline snapshot

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod reference;
pub mod schema;
pub mod scorer;
pub mod types;

pub use config::PipelineConfig;
pub use encoder::{OutputFormat, SnapshotEncoder};
pub use error::PipelineError;
pub use pipeline::{survey_to_snapshot_json, InsightsPipeline, PipelineSnapshot, Stage, Table};

// Schema exports
pub use schema::{DatasetAdapter, InputFormat, ValidationReport};

/// Crate version embedded in exported snapshots
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported snapshots
pub const PRODUCER_NAME: &str = "comfort-insights";
