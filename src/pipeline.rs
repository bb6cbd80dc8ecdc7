//! Pipeline orchestration
//!
//! This module provides the public API for Comfort Insights. It runs the
//! stage graph from raw respondent records to aggregate tables:
//!
//! ```text
//! respondents ─┬─> weight_percentiles ─> weight_perception ─┐
//!              └─> calorie_awareness ───────────────────────┴─> classified ─> scored
//! scored ─┬─> perception_by_gender
//!         ├─> awareness_by_income
//!         ├─> alignment_by_gender
//!         └─(+ comfort foods)─> comfort_food_by_gender, comfort_food_detail
//! ```
//!
//! Every stage is materialized once per run into an immutable
//! [`PipelineSnapshot`].

use crate::aggregator;
use crate::classifier::{calorie_awareness, Classifier};
use crate::config::PipelineConfig;
use crate::encoder::SnapshotEncoder;
use crate::error::PipelineError;
use crate::reference::WeightPercentileTable;
use crate::schema::{check_unique_ids, DatasetAdapter, InputFormat};
use crate::scorer::Scorer;
use crate::types::{
    AlignmentRow, CalorieAwareness, ClassifiedRecord, ComfortFoodDetailRow, ComfortFoodEntry,
    ComfortFoodRankRow, IncomeAwarenessRow, PerceptionAwarenessRow, RespondentRecord,
    ScoredRecord, WeightPercentiles, WeightPerception,
};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Named, queryable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    WeightPercentiles,
    WeightPerception,
    CalorieAwareness,
    Classified,
    Scored,
    PerceptionByGender,
    AwarenessByIncome,
    AlignmentByGender,
    ComfortFoodByGender,
    ComfortFoodDetail,
}

impl Stage {
    /// All stages, each listed after its dependencies
    pub const ALL: [Stage; 10] = [
        Stage::WeightPercentiles,
        Stage::WeightPerception,
        Stage::CalorieAwareness,
        Stage::Classified,
        Stage::Scored,
        Stage::PerceptionByGender,
        Stage::AwarenessByIncome,
        Stage::AlignmentByGender,
        Stage::ComfortFoodByGender,
        Stage::ComfortFoodDetail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::WeightPercentiles => "weight_percentiles",
            Stage::WeightPerception => "weight_perception",
            Stage::CalorieAwareness => "calorie_awareness",
            Stage::Classified => "classified",
            Stage::Scored => "scored",
            Stage::PerceptionByGender => "perception_by_gender",
            Stage::AwarenessByIncome => "awareness_by_income",
            Stage::AlignmentByGender => "alignment_by_gender",
            Stage::ComfortFoodByGender => "comfort_food_by_gender",
            Stage::ComfortFoodDetail => "comfort_food_detail",
        }
    }

    /// Stages whose output this stage reads. Raw inputs are not stages.
    pub fn dependencies(&self) -> &'static [Stage] {
        match self {
            Stage::WeightPercentiles | Stage::CalorieAwareness => &[],
            Stage::WeightPerception => &[Stage::WeightPercentiles],
            Stage::Classified => &[Stage::WeightPerception, Stage::CalorieAwareness],
            Stage::Scored => &[Stage::Classified],
            Stage::PerceptionByGender
            | Stage::AwarenessByIncome
            | Stage::AlignmentByGender
            | Stage::ComfortFoodByGender
            | Stage::ComfortFoodDetail => &[Stage::Scored],
        }
    }

    /// Whether the stage also reads the comfort-food dataset
    pub fn reads_comfort_foods(&self) -> bool {
        matches!(self, Stage::ComfortFoodByGender | Stage::ComfortFoodDetail)
    }

    /// Output columns. Respondent-level stages also carry every covariate
    /// column of the input.
    pub fn columns(&self) -> &'static [&'static str] {
        static SCORED: [&str; 25] = [
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
            "perceived_category",
            "actual_category",
            "perception_accuracy",
            "chicken_wrap_proximity",
            "scone_proximity",
            "tortilla_proximity",
            "turkey_sandwich_proximity",
            "waffle_proximity",
            "calorie_awareness_score",
            "awareness_level",
            "awareness_level_score",
            "perception_level_score",
            "score_difference",
            "alignment_level",
        ];

        match self {
            Stage::WeightPercentiles => &["gender", "p25", "p75", "p90", "sample_size"],
            Stage::WeightPerception => &[
                "id",
                "gender",
                "weight",
                "perceived_category",
                "actual_category",
                "perception_accuracy",
            ],
            Stage::CalorieAwareness => &[
                "id",
                "chicken_wrap_proximity",
                "scone_proximity",
                "tortilla_proximity",
                "turkey_sandwich_proximity",
                "waffle_proximity",
                "calorie_awareness_score",
                "awareness_level",
            ],
            Stage::Classified => &SCORED[..21],
            Stage::Scored => &SCORED,
            Stage::PerceptionByGender => &[
                "gender",
                "perception_accuracy",
                "count",
                "avg_awareness_score",
                "gender_avg_of_bracket_means",
                "deviation_from_gender_avg",
            ],
            Stage::AwarenessByIncome => &["income", "count", "avg_awareness_score"],
            Stage::AlignmentByGender => &["gender", "alignment_level", "count", "proportion"],
            Stage::ComfortFoodByGender => &[
                "gender",
                "comfort_food_mapped",
                "count",
                "avg_healthy_feeling",
                "popularity_rank",
            ],
            Stage::ComfortFoodDetail => &[
                "id",
                "gender",
                "income",
                "income_group",
                "comfort_food",
                "comfort_food_mapped",
                "healthy_feeling",
                "calorie_awareness_score",
                "awareness_level",
                "perception_accuracy",
                "alignment_level",
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| PipelineError::InvalidValue(format!("unknown stage: {s}")))
    }
}

/// Borrowed rows of one stage
#[derive(Debug, Clone, Copy)]
pub enum Table<'a> {
    WeightPercentiles(&'a [WeightPercentiles]),
    WeightPerception(&'a [WeightPerception]),
    CalorieAwareness(&'a [CalorieAwareness]),
    Classified(&'a [ClassifiedRecord]),
    Scored(&'a [ScoredRecord]),
    PerceptionByGender(&'a [PerceptionAwarenessRow]),
    AwarenessByIncome(&'a [IncomeAwarenessRow]),
    AlignmentByGender(&'a [AlignmentRow]),
    ComfortFoodByGender(&'a [ComfortFoodRankRow]),
    ComfortFoodDetail(&'a [ComfortFoodDetailRow]),
}

macro_rules! with_rows {
    ($table:expr, $rows:ident => $body:expr) => {
        match $table {
            Table::WeightPercentiles($rows) => $body,
            Table::WeightPerception($rows) => $body,
            Table::CalorieAwareness($rows) => $body,
            Table::Classified($rows) => $body,
            Table::Scored($rows) => $body,
            Table::PerceptionByGender($rows) => $body,
            Table::AwarenessByIncome($rows) => $body,
            Table::AlignmentByGender($rows) => $body,
            Table::ComfortFoodByGender($rows) => $body,
            Table::ComfortFoodDetail($rows) => $body,
        }
    };
}

impl Table<'_> {
    pub fn len(&self) -> usize {
        with_rows!(self, rows => rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each row serialized on its own line
    pub fn to_json_lines(&self) -> Result<Vec<String>, serde_json::Error> {
        with_rows!(self, rows => rows.iter().map(serde_json::to_string).collect())
    }
}

impl Serialize for Table<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        with_rows!(self, rows => rows.serialize(serializer))
    }
}

/// Every stage of one run, fully materialized
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub respondent_count: usize,
    pub comfort_food_count: usize,
    pub weight_percentiles: Vec<WeightPercentiles>,
    pub weight_perception: Vec<WeightPerception>,
    pub calorie_awareness: Vec<CalorieAwareness>,
    pub classified: Vec<ClassifiedRecord>,
    pub scored: Vec<ScoredRecord>,
    pub perception_by_gender: Vec<PerceptionAwarenessRow>,
    pub awareness_by_income: Vec<IncomeAwarenessRow>,
    pub alignment_by_gender: Vec<AlignmentRow>,
    pub comfort_food_by_gender: Vec<ComfortFoodRankRow>,
    pub comfort_food_detail: Vec<ComfortFoodDetailRow>,
}

impl PipelineSnapshot {
    pub fn table(&self, stage: Stage) -> Table<'_> {
        match stage {
            Stage::WeightPercentiles => Table::WeightPercentiles(&self.weight_percentiles),
            Stage::WeightPerception => Table::WeightPerception(&self.weight_perception),
            Stage::CalorieAwareness => Table::CalorieAwareness(&self.calorie_awareness),
            Stage::Classified => Table::Classified(&self.classified),
            Stage::Scored => Table::Scored(&self.scored),
            Stage::PerceptionByGender => Table::PerceptionByGender(&self.perception_by_gender),
            Stage::AwarenessByIncome => Table::AwarenessByIncome(&self.awareness_by_income),
            Stage::AlignmentByGender => Table::AlignmentByGender(&self.alignment_by_gender),
            Stage::ComfortFoodByGender => Table::ComfortFoodByGender(&self.comfort_food_by_gender),
            Stage::ComfortFoodDetail => Table::ComfortFoodDetail(&self.comfort_food_detail),
        }
    }

    /// A stage's rows as a JSON array
    pub fn table_value(&self, stage: Stage) -> Result<serde_json::Value, PipelineError> {
        Ok(serde_json::to_value(self.table(stage))?)
    }
}

/// Batch runner for the full stage graph
#[derive(Debug, Clone, Default)]
pub struct InsightsPipeline {
    parallel: bool,
}

impl InsightsPipeline {
    /// Create a sequential pipeline
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            parallel: config.parallel,
        }
    }

    /// Classify and score on the rayon thread pool. Output order is unchanged.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Parse both datasets, then run. Structural input problems abort before
    /// any classification.
    pub fn run_from_str(
        &self,
        respondents: &str,
        comfort_foods: &str,
        format: InputFormat,
    ) -> Result<PipelineSnapshot, PipelineError> {
        let respondents = DatasetAdapter::parse_respondents(respondents, format)?;
        let comfort_foods = DatasetAdapter::parse_comfort_foods(comfort_foods, format)?;
        self.run(&respondents, &comfort_foods)
    }

    /// Run every stage over typed records
    pub fn run(
        &self,
        respondents: &[RespondentRecord],
        comfort_foods: &[ComfortFoodEntry],
    ) -> Result<PipelineSnapshot, PipelineError> {
        check_unique_ids(respondents)?;
        info!(
            respondents = respondents.len(),
            comfort_foods = comfort_foods.len(),
            parallel = self.parallel,
            "starting pipeline run"
        );

        // Stage 1: reference cutpoints, read-only from here on
        let percentiles = WeightPercentileTable::compute(respondents);
        debug!(stage = %Stage::WeightPercentiles, rows = percentiles.rows().len());

        // Stage 2: independent per-record classification
        let classifier = Classifier::new(&percentiles);
        let weight_perception = classifier.weight_perception(respondents, self.parallel);
        debug!(stage = %Stage::WeightPerception, rows = weight_perception.len());
        let calorie_awareness = calorie_awareness(respondents, self.parallel);
        debug!(stage = %Stage::CalorieAwareness, rows = calorie_awareness.len());

        // Stage 3: join on id
        let classified = Classifier::join(respondents, &weight_perception, &calorie_awareness);
        debug!(
            stage = %Stage::Classified,
            rows = classified.len(),
            dropped = respondents.len() - classified.len()
        );

        // Stage 4: alignment scoring
        let scored = Scorer::score_all(&classified, self.parallel);
        debug!(
            stage = %Stage::Scored,
            rows = scored.len(),
            dropped = classified.len() - scored.len()
        );

        // Stage 5: aggregates over the complete scored table
        let snapshot = PipelineSnapshot {
            respondent_count: respondents.len(),
            comfort_food_count: comfort_foods.len(),
            weight_percentiles: percentiles.rows(),
            perception_by_gender: aggregator::perception_by_gender(&scored),
            awareness_by_income: aggregator::awareness_by_income(&scored),
            alignment_by_gender: aggregator::alignment_by_gender(&scored),
            comfort_food_by_gender: aggregator::comfort_food_by_gender(&scored, comfort_foods),
            comfort_food_detail: aggregator::comfort_food_detail(&scored, comfort_foods),
            weight_perception,
            calorie_awareness,
            classified,
            scored,
        };

        info!(
            classified = snapshot.classified.len(),
            scored = snapshot.scored.len(),
            "pipeline run complete"
        );
        Ok(snapshot)
    }
}

/// Run the pipeline over JSON-array datasets and return the snapshot as
/// pretty JSON (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let report = survey_to_snapshot_json(respondents_json, comfort_foods_json)?;
/// ```
pub fn survey_to_snapshot_json(
    respondents_json: String,
    comfort_foods_json: String,
) -> Result<String, PipelineError> {
    let config = PipelineConfig::default();
    let snapshot = InsightsPipeline::from_config(&config).run_from_str(
        &respondents_json,
        &comfort_foods_json,
        config.input_format,
    )?;
    SnapshotEncoder::from_config(&config).encode_snapshot(&snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlignmentLevel, Gender, PerceptionAccuracy};
    use pretty_assertions::assert_eq;

    fn sample_respondents() -> &'static str {
        r#"[
            {"id": 1, "gender": "female", "weight": 120, "self_perception_weight": "slim",
             "guessed_calories_chicken_wrap": 610, "guessed_calories_scone": 420,
             "guessed_calories_tortilla": 940, "guessed_calories_turkey_sandwich": 690,
             "guessed_calories_waffle": 900, "income": 1, "healthy_feeling": 8},
            {"id": 2, "gender": "female", "weight": 140, "self_perception_weight": "just right",
             "guessed_calories_chicken_wrap": 835, "guessed_calories_scone": 420,
             "guessed_calories_tortilla": 1165, "guessed_calories_turkey_sandwich": 500,
             "guessed_calories_waffle": 575, "income": 3, "healthy_feeling": 5},
            {"id": 3, "gender": "female", "weight": 160, "self_perception_weight": "overweight",
             "guessed_calories_chicken_wrap": 935, "guessed_calories_scone": 980,
             "guessed_calories_tortilla": 500, "guessed_calories_turkey_sandwich": 1500,
             "guessed_calories_waffle": null, "income": 6, "healthy_feeling": 3},
            {"id": 4, "gender": "female", "weight": 200, "self_perception_weight": "i dont think myself in these terms",
             "guessed_calories_chicken_wrap": 610, "guessed_calories_scone": 420,
             "guessed_calories_tortilla": 940, "guessed_calories_turkey_sandwich": 690,
             "guessed_calories_waffle": 900, "income": 2, "healthy_feeling": 7},
            {"id": 5, "gender": "male", "weight": 180, "self_perception_weight": "Very Fit",
             "guessed_calories_chicken_wrap": 610, "guessed_calories_scone": 420,
             "guessed_calories_tortilla": 940, "guessed_calories_turkey_sandwich": 690,
             "guessed_calories_waffle": 900, "income": 4, "healthy_feeling": 9},
            {"id": 6, "gender": "male", "weight": null, "self_perception_weight": "slim",
             "guessed_calories_chicken_wrap": 610, "guessed_calories_scone": 420,
             "guessed_calories_tortilla": 940, "guessed_calories_turkey_sandwich": 690,
             "guessed_calories_waffle": 900, "income": 5, "healthy_feeling": 2}
        ]"#
    }

    fn sample_comfort_foods() -> &'static str {
        r#"[
            {"id": 1, "comfort_food_mapped": "chocolate", "comfort_food": "chocolate bar"},
            {"id": 2, "comfort_food_mapped": "chocolate", "comfort_food": "brownies"},
            {"id": 2, "comfort_food_mapped": "pizza", "comfort_food": "pizza"},
            {"id": 3, "comfort_food_mapped": "", "comfort_food": "nothing"},
            {"id": 5, "comfort_food_mapped": "pizza", "comfort_food": "pepperoni pizza"},
            {"id": 6, "comfort_food_mapped": "chips", "comfort_food": "chips"},
            {"id": 42, "comfort_food_mapped": "pizza", "comfort_food": "pizza"}
        ]"#
    }

    fn run_sample() -> PipelineSnapshot {
        InsightsPipeline::new()
            .run_from_str(sample_respondents(), sample_comfort_foods(), InputFormat::Json)
            .unwrap()
    }

    #[test]
    fn test_stage_order_respects_dependencies() {
        for (idx, stage) in Stage::ALL.iter().enumerate() {
            for dep in stage.dependencies() {
                let dep_idx = Stage::ALL.iter().position(|s| s == dep).unwrap();
                assert!(dep_idx < idx, "{stage} must follow {dep}");
            }
        }
    }

    #[test]
    fn test_stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("views".parse::<Stage>().is_err());
    }

    #[test]
    fn test_row_counts_per_stage() {
        let snapshot = run_sample();
        assert_eq!(snapshot.table(Stage::WeightPercentiles).len(), 2);
        // respondent 6 has no weight
        assert_eq!(snapshot.table(Stage::WeightPerception).len(), 5);
        assert_eq!(snapshot.table(Stage::CalorieAwareness).len(), 6);
        assert_eq!(snapshot.table(Stage::Classified).len(), 5);
        // respondent 4's perception text is unrecognized
        assert_eq!(snapshot.table(Stage::Scored).len(), 4);
    }

    #[test]
    fn test_unspecified_iff_perception_absent() {
        let snapshot = run_sample();
        for record in &snapshot.classified {
            assert_eq!(
                record.perception_accuracy == PerceptionAccuracy::Unspecified,
                record.perceived_category.is_none()
            );
        }
        assert!(snapshot
            .scored
            .iter()
            .all(|r| r.classified.perceived_category.is_some()));
    }

    #[test]
    fn test_sample_alignment() {
        let snapshot = run_sample();
        // female cutpoints over [120, 140, 160, 200]: p25 = 135, p75 = 170, p90 = 188
        let first = &snapshot.scored[0];
        assert_eq!(first.id(), 1);
        // slim vs Underweight, 15 points
        assert_eq!(first.classified.perception_accuracy, PerceptionAccuracy::VeryClose);
        assert_eq!(first.classified.calorie_awareness_score, 15);
        assert_eq!(first.alignment_level, AlignmentLevel::PerfectlyAligned);

        let female_total: f64 = snapshot
            .alignment_by_gender
            .iter()
            .filter(|r| r.gender == Gender::Female)
            .map(|r| r.proportion)
            .sum();
        assert!((female_total - 1.0).abs() <= 0.01);
    }

    #[test]
    fn test_comfort_food_join() {
        let snapshot = run_sample();
        let detail_ids: Vec<u32> = snapshot.comfort_food_detail.iter().map(|r| r.id).collect();
        // blank food, respondent without weight and unknown id are dropped
        assert_eq!(detail_ids, vec![1, 2, 2, 5]);

        let female: Vec<_> = snapshot
            .comfort_food_by_gender
            .iter()
            .filter(|r| r.gender == Gender::Female)
            .map(|r| (r.comfort_food_mapped.as_str(), r.count, r.popularity_rank))
            .collect();
        assert_eq!(female, vec![("chocolate", 2, 1), ("pizza", 1, 2)]);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let sequential = run_sample();
        let parallel = InsightsPipeline::new()
            .with_parallel(true)
            .run_from_str(sample_respondents(), sample_comfort_foods(), InputFormat::Json)
            .unwrap();
        for stage in Stage::ALL {
            assert_eq!(
                sequential.table_value(stage).unwrap(),
                parallel.table_value(stage).unwrap()
            );
        }
    }

    #[test]
    fn test_missing_column_aborts_run() {
        let result = InsightsPipeline::new().run_from_str(
            sample_respondents(),
            r#"[{"id": 1, "comfort_food": "pizza"}]"#,
            InputFormat::Json,
        );
        assert!(matches!(result, Err(PipelineError::MissingColumn { .. })));
    }

    #[test]
    fn test_empty_input() {
        let snapshot = InsightsPipeline::new()
            .run_from_str("[]", "[]", InputFormat::Json)
            .unwrap();
        for stage in Stage::ALL {
            assert!(snapshot.table(stage).is_empty());
        }
    }

    #[test]
    fn test_columns_match_serialized_rows() {
        let snapshot = run_sample();
        for stage in Stage::ALL {
            let value = snapshot.table_value(stage).unwrap();
            let Some(first) = value.as_array().and_then(|rows| rows.first()) else {
                continue;
            };
            let row = first.as_object().unwrap();
            for column in stage.columns() {
                assert!(row.contains_key(*column), "{stage} lacks column {column}");
            }
        }
    }

    #[test]
    fn test_survey_to_snapshot_json() {
        let json = survey_to_snapshot_json(
            sample_respondents().to_string(),
            sample_comfort_foods().to_string(),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["producer"]["name"], "comfort-insights");
        assert_eq!(value["tables"]["scored"].as_array().unwrap().len(), 4);
    }
}
