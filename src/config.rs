//! Run configuration
//!
//! Settings can be loaded from a TOML file; every key is optional and falls
//! back to the default shown below.
//!
//! ```toml
//! parallel = false
//! include_provenance = true
//! input_format = "json"         # or "ndjson"
//! output_format = "json_pretty" # or "json", "ndjson"
//! ```

use crate::encoder::OutputFormat;
use crate::error::PipelineError;
use crate::schema::InputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Classify and score records on the rayon thread pool
    pub parallel: bool,
    /// Add producer, run id and timestamp to exported snapshots
    pub include_provenance: bool,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            include_provenance: true,
            input_format: InputFormat::Json,
            output_format: OutputFormat::JsonPretty,
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            PipelineError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(toml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            parallel = true
            output_format = "ndjson"
            "#,
        )
        .unwrap();
        assert!(config.parallel);
        assert!(config.include_provenance);
        assert_eq!(config.input_format, InputFormat::Json);
        assert_eq!(config.output_format, OutputFormat::Ndjson);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = PipelineConfig::from_toml_str("threads = 4").unwrap_err();
        assert!(matches!(err, PipelineError::TomlError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "input_format = \"ndjson\"").unwrap();
        let config = PipelineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.input_format, InputFormat::Ndjson);

        let missing = PipelineConfig::load_from_file("/nonexistent/comfort.toml");
        assert!(matches!(missing, Err(PipelineError::ConfigError(_))));
    }
}
