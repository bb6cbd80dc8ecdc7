//! Reference tables
//!
//! Fixed rubrics consulted by the classifier and scorer, plus the one
//! data-derived table: gender-partitioned weight percentiles.

use crate::types::{
    AlignmentLevel, AwarenessLevel, CalorieItem, Gender, ItemProximity, PerceptionAccuracy,
    RespondentRecord, WeightCategory, WeightPercentiles,
};
use std::collections::BTreeMap;

/// Recognized self-perception phrases (lowercase, single-spaced)
pub const PERCEPTION_PHRASES: [(&str, WeightCategory); 5] = [
    ("slim", WeightCategory::Underweight),
    ("very fit", WeightCategory::Normal),
    ("just right", WeightCategory::Normal),
    ("slightly overweight", WeightCategory::Overweight),
    ("overweight", WeightCategory::Obese),
];

/// Actual calories of each surveyed food item
pub const CALORIE_REFERENCES: [(CalorieItem, f64); 5] = [
    (CalorieItem::ChickenWrap, 610.0),
    (CalorieItem::Scone, 420.0),
    (CalorieItem::Tortilla, 940.0),
    (CalorieItem::TurkeySandwich, 690.0),
    (CalorieItem::Waffle, 900.0),
];

/// Upper distance bound (inclusive) for each proximity label, tightest first.
/// Distances above the last bound are `WayOff`.
pub const PROXIMITY_BOUNDS: [(f64, ItemProximity); 3] = [
    (0.0, ItemProximity::VeryClose),
    (225.0, ItemProximity::Close),
    (325.0, ItemProximity::Off),
];

pub const PROXIMITY_POINTS: [(ItemProximity, u8); 4] = [
    (ItemProximity::VeryClose, 3),
    (ItemProximity::Close, 2),
    (ItemProximity::Off, 1),
    (ItemProximity::WayOff, 0),
];

/// Minimum awareness score for each level, highest first.
/// Scores below the last threshold are `Unaware`.
pub const AWARENESS_THRESHOLDS: [(u8, AwarenessLevel); 3] = [
    (13, AwarenessLevel::VeryAware),
    (10, AwarenessLevel::Aware),
    (7, AwarenessLevel::SomewhatAware),
];

/// Perception accuracy by category distance; larger distances are `FarOff`
pub const PERCEPTION_DISTANCES: [(u8, PerceptionAccuracy); 2] = [
    (0, PerceptionAccuracy::VeryClose),
    (1, PerceptionAccuracy::Close),
];

/// Alignment by score difference; larger differences are `SevereMisalignment`
pub const ALIGNMENT_DIFFERENCES: [(u8, AlignmentLevel); 3] = [
    (0, AlignmentLevel::PerfectlyAligned),
    (1, AlignmentLevel::SlightMisalignment),
    (2, AlignmentLevel::ModerateMisalignment),
];

pub const WEIGHT_CATEGORY_ORDINALS: [(WeightCategory, u8); 4] = [
    (WeightCategory::Underweight, 1),
    (WeightCategory::Normal, 2),
    (WeightCategory::Overweight, 3),
    (WeightCategory::Obese, 4),
];

pub const AWARENESS_LEVEL_ORDINALS: [(AwarenessLevel, u8); 4] = [
    (AwarenessLevel::VeryAware, 3),
    (AwarenessLevel::Aware, 2),
    (AwarenessLevel::SomewhatAware, 1),
    (AwarenessLevel::Unaware, 0),
];

pub const PERCEPTION_ACCURACY_ORDINALS: [(PerceptionAccuracy, u8); 4] = [
    (PerceptionAccuracy::VeryClose, 3),
    (PerceptionAccuracy::Close, 2),
    (PerceptionAccuracy::FarOff, 1),
    (PerceptionAccuracy::Unspecified, 0),
];

fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: K) -> Option<V> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Map free-text self-perception to a category. Matching ignores case and
/// surrounding/repeated whitespace; unrecognized text yields `None`.
pub fn lookup_perceived_category(text: &str) -> Option<WeightCategory> {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    PERCEPTION_PHRASES
        .iter()
        .find(|(phrase, _)| *phrase == normalized)
        .map(|(_, category)| *category)
}

pub fn actual_calories(item: CalorieItem) -> f64 {
    lookup(&CALORIE_REFERENCES, item).unwrap_or_default()
}

pub fn proximity_points(proximity: ItemProximity) -> u8 {
    lookup(&PROXIMITY_POINTS, proximity).unwrap_or(0)
}

pub fn weight_category_ordinal(category: WeightCategory) -> u8 {
    lookup(&WEIGHT_CATEGORY_ORDINALS, category).unwrap_or(0)
}

pub fn awareness_level_ordinal(level: AwarenessLevel) -> u8 {
    lookup(&AWARENESS_LEVEL_ORDINALS, level).unwrap_or(0)
}

/// `Unspecified` maps to 0
pub fn perception_accuracy_ordinal(accuracy: PerceptionAccuracy) -> u8 {
    lookup(&PERCEPTION_ACCURACY_ORDINALS, accuracy).unwrap_or(0)
}

/// Continuous percentile over ascending `sorted` values, interpolating
/// linearly between the two nearest ranks (SQL `PERCENTILE_CONT`).
pub fn percentile_cont(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&fraction) {
        return None;
    }
    let rank = fraction * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + weight * (sorted[upper] - sorted[lower]))
}

/// Weight cutpoints for every gender present in a record set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightPercentileTable {
    rows: BTreeMap<Gender, WeightPercentiles>,
}

impl WeightPercentileTable {
    /// Compute 25th/75th/90th percentiles of `weight` per gender. Absent and
    /// non-finite weights are ignored; genders without any weight get no row.
    pub fn compute(records: &[RespondentRecord]) -> Self {
        let mut weights: BTreeMap<Gender, Vec<f64>> = BTreeMap::new();
        for record in records {
            if let Some(weight) = record.weight.filter(|w| w.is_finite()) {
                weights.entry(record.gender).or_default().push(weight);
            }
        }

        let rows = weights
            .into_iter()
            .filter_map(|(gender, mut values)| {
                values.sort_by(f64::total_cmp);
                Some((
                    gender,
                    WeightPercentiles {
                        gender,
                        p25: percentile_cont(&values, 0.25)?,
                        p75: percentile_cont(&values, 0.75)?,
                        p90: percentile_cont(&values, 0.90)?,
                        sample_size: values.len(),
                    },
                ))
            })
            .collect();

        Self { rows }
    }

    pub fn get(&self, gender: Gender) -> Option<&WeightPercentiles> {
        self.rows.get(&gender)
    }

    /// Rows ordered by gender
    pub fn rows(&self) -> Vec<WeightPercentiles> {
        self.rows.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
