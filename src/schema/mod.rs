//! Input dataset schema
//!
//! Column requirements for the respondent and comfort-food datasets, and the
//! adapter that turns JSON / NDJSON input into typed records. Structural
//! problems are caught here, before any classification runs.

mod adapter;
mod dataset;

pub use adapter::*;
pub use dataset::*;
