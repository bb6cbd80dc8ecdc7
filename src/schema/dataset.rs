//! Dataset column requirements

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// One raw input row: column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Encoding of an input dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// JSON array of row objects
    #[default]
    Json,
    /// Newline-delimited JSON, one row object per line
    Ndjson,
}

/// Named dataset with the columns the pipeline reads from it
#[derive(Debug, Clone, Copy)]
pub struct DatasetSchema {
    pub name: &'static str,
    pub required_columns: &'static [&'static str],
}

pub const RESPONDENT_SCHEMA: DatasetSchema = DatasetSchema {
    name: "respondents",
    required_columns: &[
        "id",
        "gender",
        "weight",
        "self_perception_weight",
        "guessed_calories_chicken_wrap",
        "guessed_calories_scone",
        "guessed_calories_tortilla",
        "guessed_calories_turkey_sandwich",
        "guessed_calories_waffle",
        "income",
        "healthy_feeling",
    ],
};

pub const COMFORT_FOOD_SCHEMA: DatasetSchema = DatasetSchema {
    name: "comfort_foods",
    required_columns: &["id", "comfort_food_mapped", "comfort_food"],
};

impl DatasetSchema {
    /// Required columns that no row carries. A column present in at least one
    /// row is not missing; rows lacking it simply have an absent value.
    /// An empty dataset has no missing columns.
    pub fn missing_columns(&self, rows: &[Row]) -> Vec<&'static str> {
        if rows.is_empty() {
            return Vec::new();
        }
        self.required_columns
            .iter()
            .copied()
            .filter(|column| !rows.iter().any(|row| row.contains_key(*column)))
            .collect()
    }

    /// Fail on the first structurally missing column
    pub fn check_columns(&self, rows: &[Row]) -> Result<(), PipelineError> {
        match self.missing_columns(rows).first() {
            Some(column) => Err(PipelineError::MissingColumn {
                dataset: self.name.to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}
