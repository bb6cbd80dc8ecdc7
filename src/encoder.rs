//! Snapshot encoding
//!
//! Serializes a [`PipelineSnapshot`] into JSON, pretty JSON or NDJSON.
//! Tables are written in stage order and their content depends only on the
//! input, so two runs over the same datasets produce byte-identical tables.
//! Only the optional provenance block (run id, timestamp) varies per run.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{PipelineSnapshot, Stage};
use crate::{PRODUCER_NAME, VERSION};
use chrono::Utc;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    JsonPretty,
    /// One JSON object per line
    Ndjson,
}

impl OutputFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::Json | OutputFormat::JsonPretty => "json",
            OutputFormat::Ndjson => "ndjson",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
}

/// Per-run metadata attached to a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub run_id: String,
    pub computed_at_utc: String,
    pub respondents: usize,
    pub comfort_food_entries: usize,
}

/// Every table keyed by stage name, in stage order
struct Tables<'a>(&'a PipelineSnapshot);

impl Serialize for Tables<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Stage::ALL.len()))?;
        for stage in Stage::ALL {
            map.serialize_entry(stage.as_str(), &self.0.table(stage))?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    producer: Producer,
    #[serde(skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
    tables: Tables<'a>,
}

#[derive(Serialize)]
struct Header {
    producer: Producer,
    #[serde(skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
}

#[derive(Serialize)]
struct TableLine<'a> {
    table: &'static str,
    row: &'a serde_json::Value,
}

/// Encoder for pipeline snapshots
#[derive(Debug, Clone)]
pub struct SnapshotEncoder {
    format: OutputFormat,
    include_provenance: bool,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new(OutputFormat::JsonPretty)
    }
}

impl SnapshotEncoder {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            include_provenance: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.output_format).with_provenance(config.include_provenance)
    }

    pub fn with_provenance(mut self, include_provenance: bool) -> Self {
        self.include_provenance = include_provenance;
        self
    }

    fn producer() -> Producer {
        Producer {
            name: PRODUCER_NAME.to_string(),
            version: VERSION.to_string(),
        }
    }

    fn provenance(&self, snapshot: &PipelineSnapshot) -> Option<Provenance> {
        self.include_provenance.then(|| Provenance {
            run_id: Uuid::new_v4().to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            respondents: snapshot.respondent_count,
            comfort_food_entries: snapshot.comfort_food_count,
        })
    }

    /// Encode the whole snapshot with producer metadata.
    ///
    /// NDJSON output starts with a header line holding the metadata, followed
    /// by one `{"table": ..., "row": ...}` line per row.
    pub fn encode_snapshot(&self, snapshot: &PipelineSnapshot) -> Result<String, PipelineError> {
        let producer = Self::producer();
        let provenance = self.provenance(snapshot);

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&Envelope {
                producer,
                provenance,
                tables: Tables(snapshot),
            })?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&Envelope {
                producer,
                provenance,
                tables: Tables(snapshot),
            })?),
            OutputFormat::Ndjson => {
                let mut lines = vec![serde_json::to_string(&Header {
                    producer,
                    provenance,
                })?];
                lines.extend(table_lines(snapshot)?);
                Ok(join_lines(lines))
            }
        }
    }

    /// Encode all tables without any per-run metadata
    pub fn encode_tables(&self, snapshot: &PipelineSnapshot) -> Result<String, PipelineError> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&Tables(snapshot))?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&Tables(snapshot))?),
            OutputFormat::Ndjson => Ok(join_lines(table_lines(snapshot)?)),
        }
    }

    /// Encode one stage's rows: a JSON array, or one row per line for NDJSON
    pub fn encode_table(
        &self,
        snapshot: &PipelineSnapshot,
        stage: Stage,
    ) -> Result<String, PipelineError> {
        let table = snapshot.table(stage);
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(&table)?),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&table)?),
            OutputFormat::Ndjson => Ok(join_lines(table.to_json_lines()?)),
        }
    }

    /// Write one file per stage (`<stage>.json` or `<stage>.ndjson`) into
    /// `dir`, creating it if needed. Returns the written paths in stage order.
    pub fn write_table_files(
        &self,
        snapshot: &PipelineSnapshot,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let path = dir.join(format!("{}.{}", stage, self.format.file_extension()));
            let contents = self.encode_table(snapshot, stage)?;
            fs::write(&path, contents).map_err(|e| {
                PipelineError::EncodingError(format!("{}: {}", path.display(), e))
            })?;
            written.push(path);
        }
        Ok(written)
    }
}

fn table_lines(snapshot: &PipelineSnapshot) -> Result<Vec<String>, PipelineError> {
    let mut lines = Vec::new();
    for stage in Stage::ALL {
        let value = snapshot.table_value(stage)?;
        if let serde_json::Value::Array(rows) = &value {
            for row in rows {
                lines.push(serde_json::to_string(&TableLine {
                    table: stage.as_str(),
                    row,
                })?);
            }
        }
    }
    Ok(lines)
}

fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
