//! Adapter for converting raw dataset text into typed records

use crate::error::PipelineError;
use crate::schema::dataset::{DatasetSchema, InputFormat, Row, COMFORT_FOOD_SCHEMA, RESPONDENT_SCHEMA};
use crate::types::{ComfortFoodEntry, RespondentRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;

/// Adapter for parsing and validating input datasets
pub struct DatasetAdapter;

impl DatasetAdapter {
    /// Parse dataset text into raw rows without interpreting any column
    pub fn parse_rows(input: &str, format: InputFormat) -> Result<Vec<Row>, PipelineError> {
        match format {
            InputFormat::Json => {
                let values: Vec<serde_json::Value> = serde_json::from_str(input)?;
                values
                    .into_iter()
                    .enumerate()
                    .map(|(idx, value)| into_row(value, idx))
                    .collect()
            }
            InputFormat::Ndjson => {
                let mut rows = Vec::new();
                for (line_num, line) in input.lines().enumerate() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let value: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                        PipelineError::ParseError(format!(
                            "Failed to parse line {}: {}",
                            line_num + 1,
                            e
                        ))
                    })?;
                    rows.push(into_row(value, line_num)?);
                }
                Ok(rows)
            }
        }
    }

    /// Parse the respondent dataset. Fails on a structurally missing column,
    /// an unparseable row, or a duplicate id.
    pub fn parse_respondents(
        input: &str,
        format: InputFormat,
    ) -> Result<Vec<RespondentRecord>, PipelineError> {
        let rows = Self::parse_rows(input, format)?;
        let records: Vec<RespondentRecord> = deserialize_rows(&RESPONDENT_SCHEMA, rows)?;
        check_unique_ids(&records)?;
        Ok(records)
    }

    /// Parse the comfort-food dataset
    pub fn parse_comfort_foods(
        input: &str,
        format: InputFormat,
    ) -> Result<Vec<ComfortFoodEntry>, PipelineError> {
        let rows = Self::parse_rows(input, format)?;
        deserialize_rows(&COMFORT_FOOD_SCHEMA, rows)
    }

    /// Check every row of a dataset and collect all problems instead of
    /// stopping at the first.
    pub fn validate<T: DeserializeOwned>(schema: &DatasetSchema, rows: &[Row]) -> ValidationReport {
        let missing_columns: Vec<String> = schema
            .missing_columns(rows)
            .into_iter()
            .map(str::to_string)
            .collect();

        let errors: Vec<RowError> = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                serde_json::from_value::<T>(serde_json::Value::Object(row.clone()))
                    .err()
                    .map(|e| RowError {
                        index,
                        id: row.get("id").and_then(|v| v.as_u64()),
                        error: e.to_string(),
                    })
            })
            .collect();

        ValidationReport {
            dataset: schema.name.to_string(),
            total_rows: rows.len(),
            valid_rows: rows.len() - errors.len(),
            missing_columns,
            errors,
        }
    }
}

/// Reject a respondent set in which an id appears twice
pub fn check_unique_ids(records: &[RespondentRecord]) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(PipelineError::InvalidValue(format!(
                "duplicate respondent id {}",
                record.id
            )));
        }
    }
    Ok(())
}

fn into_row(value: serde_json::Value, index: usize) -> Result<Row, PipelineError> {
    match value {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(PipelineError::ParseError(format!(
            "Row {} is not an object: {}",
            index + 1,
            other
        ))),
    }
}

fn deserialize_rows<T: DeserializeOwned>(
    schema: &DatasetSchema,
    rows: Vec<Row>,
) -> Result<Vec<T>, PipelineError> {
    schema.check_columns(&rows)?;
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| {
                PipelineError::InvalidValue(format!("{} row {}: {}", schema.name, idx + 1, e))
            })
        })
        .collect()
}

/// Result of validating one dataset
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub dataset: String,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub missing_columns: Vec<String>,
    pub errors: Vec<RowError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty() && self.errors.is_empty()
    }
}

/// A row that failed to parse
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub index: usize,
    pub id: Option<u64>,
    pub error: String,
}
