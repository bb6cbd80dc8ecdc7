//! Error types for Comfort Insights

use thiserror::Error;

/// Errors that can abort a pipeline run.
///
/// Missing values and unrecognized category text are not errors; they are
/// absorbed by the classifier's absent-value rules.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to parse dataset: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Dataset '{dataset}' is missing required column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
