//! Core types for the Comfort Insights pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw respondent records, the two per-record classification tables,
//! classified and scored records, and the aggregate rows.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Respondent gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }

    /// Parse a textual gender (`female`, `Male`, `f`, ...)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "female" | "f" => Some(Gender::Female),
            "male" | "m" => Some(Gender::Male),
            other => other.parse::<i64>().ok().and_then(Gender::from_code),
        }
    }

    /// Survey coding: 1 = female, 2 = male
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Gender::Female),
            2 => Some(Gender::Male),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let parsed = match &raw {
            serde_json::Value::String(s) => Gender::parse(s),
            serde_json::Value::Number(n) => n.as_i64().and_then(Gender::from_code),
            _ => None,
        };
        parsed.ok_or_else(|| D::Error::custom(format!("unrecognized gender: {raw}")))
    }
}

/// Household income bracket, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IncomeBracket {
    #[serde(rename = "<$15k")]
    Under15k,
    #[serde(rename = "$15–30k")]
    From15To30k,
    #[serde(rename = "$30–50k")]
    From30To50k,
    #[serde(rename = "$50–70k")]
    From50To70k,
    #[serde(rename = "$70–100k")]
    From70To100k,
    #[serde(rename = ">$100k")]
    Over100k,
}

impl IncomeBracket {
    pub const ALL: [IncomeBracket; 6] = [
        IncomeBracket::Under15k,
        IncomeBracket::From15To30k,
        IncomeBracket::From30To50k,
        IncomeBracket::From50To70k,
        IncomeBracket::From70To100k,
        IncomeBracket::Over100k,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IncomeBracket::Under15k => "<$15k",
            IncomeBracket::From15To30k => "$15–30k",
            IncomeBracket::From30To50k => "$30–50k",
            IncomeBracket::From50To70k => "$50–70k",
            IncomeBracket::From70To100k => "$70–100k",
            IncomeBracket::Over100k => ">$100k",
        }
    }

    /// Survey coding 1..=6, lowest bracket first
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Parse a display label or a numeric code. ASCII hyphens are accepted in
    /// place of the en dash.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        let normalized = trimmed.replace('-', "–").to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|bracket| bracket.label().to_lowercase() == normalized)
    }

    /// Three-level grouping used by the detailed comfort-food table
    pub fn group(&self) -> IncomeGroup {
        match self {
            IncomeBracket::Under15k | IncomeBracket::From15To30k => IncomeGroup::Low,
            IncomeBracket::From30To50k | IncomeBracket::From50To70k => IncomeGroup::Mid,
            IncomeBracket::From70To100k | IncomeBracket::Over100k => IncomeGroup::High,
        }
    }
}

/// Coarse income grouping: Low (<$30k), Mid ($30–70k), High (>$70k)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IncomeGroup {
    Low,
    Mid,
    High,
}

/// Blank and null incomes are absent; anything else must be a known bracket.
fn deserialize_income<'de, D>(deserializer: D) -> Result<Option<IncomeBracket>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => IncomeBracket::parse(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized income bracket: {s}"))),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(IncomeBracket::from_code)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized income code: {n}"))),
        Some(other) => Err(D::Error::custom(format!(
            "unrecognized income value: {other}"
        ))),
    }
}

/// Weight category, shared by perceived and actual classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeightCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

/// Closeness of perceived to actual weight category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PerceptionAccuracy {
    VeryClose,
    Close,
    FarOff,
    Unspecified,
}

/// Closeness of a single calorie guess to the reference value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemProximity {
    VeryClose,
    Close,
    Off,
    WayOff,
}

/// Composite calorie awareness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AwarenessLevel {
    VeryAware,
    Aware,
    SomewhatAware,
    Unaware,
}

/// Agreement between awareness level and perception accuracy, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlignmentLevel {
    PerfectlyAligned,
    SlightMisalignment,
    ModerateMisalignment,
    SevereMisalignment,
}

impl AlignmentLevel {
    pub const ALL: [AlignmentLevel; 4] = [
        AlignmentLevel::PerfectlyAligned,
        AlignmentLevel::SlightMisalignment,
        AlignmentLevel::ModerateMisalignment,
        AlignmentLevel::SevereMisalignment,
    ];
}

/// Food items whose calories respondents were asked to guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalorieItem {
    ChickenWrap,
    Scone,
    Tortilla,
    TurkeySandwich,
    Waffle,
}

impl CalorieItem {
    pub const ALL: [CalorieItem; 5] = [
        CalorieItem::ChickenWrap,
        CalorieItem::Scone,
        CalorieItem::Tortilla,
        CalorieItem::TurkeySandwich,
        CalorieItem::Waffle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalorieItem::ChickenWrap => "chicken_wrap",
            CalorieItem::Scone => "scone",
            CalorieItem::Tortilla => "tortilla",
            CalorieItem::TurkeySandwich => "turkey_sandwich",
            CalorieItem::Waffle => "waffle",
        }
    }
}

/// One survey participant, as delivered by the upstream cleaning step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondentRecord {
    /// Unique respondent identifier
    pub id: u32,
    pub gender: Gender,
    /// Body weight (lbs)
    #[serde(default)]
    pub weight: Option<f64>,
    /// Free-text self-perceived weight ("just right", "slim", ...)
    #[serde(default)]
    pub self_perception_weight: Option<String>,
    #[serde(default)]
    pub guessed_calories_chicken_wrap: Option<f64>,
    #[serde(default)]
    pub guessed_calories_scone: Option<f64>,
    #[serde(default)]
    pub guessed_calories_tortilla: Option<f64>,
    #[serde(default)]
    pub guessed_calories_turkey_sandwich: Option<f64>,
    #[serde(default)]
    pub guessed_calories_waffle: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_income")]
    pub income: Option<IncomeBracket>,
    /// Self-rated healthiness, 1-10
    #[serde(default)]
    pub healthy_feeling: Option<f64>,
    /// Opaque behavioral covariates (employment, sports, vitamins, ...)
    #[serde(flatten)]
    pub covariates: BTreeMap<String, serde_json::Value>,
}

impl RespondentRecord {
    /// Calorie guess for a single item
    pub fn guess(&self, item: CalorieItem) -> Option<f64> {
        match item {
            CalorieItem::ChickenWrap => self.guessed_calories_chicken_wrap,
            CalorieItem::Scone => self.guessed_calories_scone,
            CalorieItem::Tortilla => self.guessed_calories_tortilla,
            CalorieItem::TurkeySandwich => self.guessed_calories_turkey_sandwich,
            CalorieItem::Waffle => self.guessed_calories_waffle,
        }
    }
}

/// Comfort food named by a respondent (zero or more per respondent)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComfortFoodEntry {
    pub id: u32,
    /// Normalized food category; blank entries are excluded from aggregates
    #[serde(default)]
    pub comfort_food_mapped: Option<String>,
    /// Raw answer text
    #[serde(default)]
    pub comfort_food: Option<String>,
}

impl ComfortFoodEntry {
    /// Trimmed mapped category, or `None` when blank
    pub fn mapped_category(&self) -> Option<&str> {
        self.comfort_food_mapped
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Gender-partitioned weight cutpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightPercentiles {
    pub gender: Gender,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    /// Number of non-absent weights the cutpoints were computed from
    pub sample_size: usize,
}

/// Weight-perception classification (respondents with a weight only)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightPerception {
    pub id: u32,
    pub gender: Gender,
    pub weight: f64,
    pub perceived_category: Option<WeightCategory>,
    pub actual_category: WeightCategory,
    pub perception_accuracy: PerceptionAccuracy,
}

/// Per-item proximity labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemProximities {
    #[serde(rename = "chicken_wrap_proximity")]
    pub chicken_wrap: ItemProximity,
    #[serde(rename = "scone_proximity")]
    pub scone: ItemProximity,
    #[serde(rename = "tortilla_proximity")]
    pub tortilla: ItemProximity,
    #[serde(rename = "turkey_sandwich_proximity")]
    pub turkey_sandwich: ItemProximity,
    #[serde(rename = "waffle_proximity")]
    pub waffle: ItemProximity,
}

impl ItemProximities {
    pub fn get(&self, item: CalorieItem) -> ItemProximity {
        match item {
            CalorieItem::ChickenWrap => self.chicken_wrap,
            CalorieItem::Scone => self.scone,
            CalorieItem::Tortilla => self.tortilla,
            CalorieItem::TurkeySandwich => self.turkey_sandwich,
            CalorieItem::Waffle => self.waffle,
        }
    }
}

/// Calorie-awareness classification (every respondent)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalorieAwareness {
    pub id: u32,
    #[serde(flatten)]
    pub item_proximity: ItemProximities,
    /// Sum of the five item points, 0-15
    pub calorie_awareness_score: u8,
    pub awareness_level: AwarenessLevel,
}

/// Respondent joined with both classification tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    #[serde(flatten)]
    pub respondent: RespondentRecord,
    pub perceived_category: Option<WeightCategory>,
    pub actual_category: WeightCategory,
    pub perception_accuracy: PerceptionAccuracy,
    #[serde(flatten)]
    pub item_proximity: ItemProximities,
    pub calorie_awareness_score: u8,
    pub awareness_level: AwarenessLevel,
}

/// Classified record with alignment scoring. Only exists for respondents
/// with a perceived category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub classified: ClassifiedRecord,
    pub awareness_level_score: u8,
    pub perception_level_score: u8,
    pub score_difference: u8,
    pub alignment_level: AlignmentLevel,
}

impl ScoredRecord {
    pub fn id(&self) -> u32 {
        self.classified.respondent.id
    }

    pub fn gender(&self) -> Gender {
        self.classified.respondent.gender
    }
}

/// Awareness by gender and perception-accuracy bracket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerceptionAwarenessRow {
    pub gender: Gender,
    pub perception_accuracy: PerceptionAccuracy,
    pub count: usize,
    pub avg_awareness_score: f64,
    /// Mean of this gender's bracket means
    pub gender_avg_of_bracket_means: f64,
    /// `avg_awareness_score` minus `gender_avg_of_bracket_means`
    pub deviation_from_gender_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeAwarenessRow {
    pub income: IncomeBracket,
    pub count: usize,
    pub avg_awareness_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentRow {
    pub gender: Gender,
    pub alignment_level: AlignmentLevel,
    pub count: usize,
    /// Share of the gender's scored respondents
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComfortFoodRankRow {
    pub gender: Gender,
    pub comfort_food_mapped: String,
    pub count: usize,
    pub avg_healthy_feeling: Option<f64>,
    /// Dense rank by count within the gender, 1 = most popular
    pub popularity_rank: u32,
}

/// One row per (respondent, comfort food) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComfortFoodDetailRow {
    pub id: u32,
    pub gender: Gender,
    pub income: Option<IncomeBracket>,
    pub income_group: Option<IncomeGroup>,
    pub comfort_food: Option<String>,
    pub comfort_food_mapped: String,
    pub healthy_feeling: Option<f64>,
    pub calorie_awareness_score: u8,
    pub awareness_level: AwarenessLevel,
    pub perception_accuracy: PerceptionAccuracy,
    pub alignment_level: AlignmentLevel,
}
