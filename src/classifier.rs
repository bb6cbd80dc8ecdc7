//! Per-record classification
//!
//! Two independent sub-pipelines run over the respondent records:
//! - weight perception (respondents with a weight only)
//! - calorie awareness (every respondent)
//!
//! Their outputs are joined on `id` into classified records.

use crate::reference::{
    actual_calories, lookup_perceived_category, proximity_points, weight_category_ordinal,
    WeightPercentileTable, AWARENESS_THRESHOLDS, PERCEPTION_DISTANCES, PROXIMITY_BOUNDS,
};
use crate::types::{
    AwarenessLevel, CalorieAwareness, CalorieItem, ClassifiedRecord, ItemProximities,
    ItemProximity, PerceptionAccuracy, RespondentRecord, WeightCategory, WeightPercentiles,
    WeightPerception,
};
use rayon::prelude::*;
use std::collections::HashMap;

/// Classifier bound to a dataset's weight percentile table
pub struct Classifier<'a> {
    percentiles: &'a WeightPercentileTable,
}

impl<'a> Classifier<'a> {
    pub fn new(percentiles: &'a WeightPercentileTable) -> Self {
        Self { percentiles }
    }

    /// Classify perceived vs. actual weight. Returns `None` when the
    /// respondent has no usable weight or their gender has no cutpoints.
    pub fn classify_weight(&self, record: &RespondentRecord) -> Option<WeightPerception> {
        let weight = record.weight.filter(|w| w.is_finite())?;
        let cutpoints = self.percentiles.get(record.gender)?;

        let actual_category = classify_actual_category(weight, cutpoints);
        let perceived_category = record
            .self_perception_weight
            .as_deref()
            .and_then(lookup_perceived_category);

        Some(WeightPerception {
            id: record.id,
            gender: record.gender,
            weight,
            perceived_category,
            actual_category,
            perception_accuracy: classify_perception_accuracy(perceived_category, actual_category),
        })
    }

    /// Weight-perception table, in input order
    pub fn weight_perception(&self, records: &[RespondentRecord], parallel: bool) -> Vec<WeightPerception> {
        if parallel {
            records
                .par_iter()
                .filter_map(|r| self.classify_weight(r))
                .collect()
        } else {
            records.iter().filter_map(|r| self.classify_weight(r)).collect()
        }
    }

    /// Inner join of respondents with both classification tables on `id`
    pub fn join(
        records: &[RespondentRecord],
        weight_perception: &[WeightPerception],
        calorie_awareness: &[CalorieAwareness],
    ) -> Vec<ClassifiedRecord> {
        let by_weight: HashMap<u32, &WeightPerception> =
            weight_perception.iter().map(|w| (w.id, w)).collect();
        let by_calorie: HashMap<u32, &CalorieAwareness> =
            calorie_awareness.iter().map(|c| (c.id, c)).collect();

        records
            .iter()
            .filter_map(|record| {
                let weight = by_weight.get(&record.id)?;
                let calorie = by_calorie.get(&record.id)?;
                Some(ClassifiedRecord {
                    respondent: record.clone(),
                    perceived_category: weight.perceived_category,
                    actual_category: weight.actual_category,
                    perception_accuracy: weight.perception_accuracy,
                    item_proximity: calorie.item_proximity,
                    calorie_awareness_score: calorie.calorie_awareness_score,
                    awareness_level: calorie.awareness_level,
                })
            })
            .collect()
    }
}

/// Calorie-awareness classification for a single respondent
pub fn classify_calories(record: &RespondentRecord) -> CalorieAwareness {
    let proximity = |item: CalorieItem| classify_item_proximity(record.guess(item), actual_calories(item));
    let item_proximity = ItemProximities {
        chicken_wrap: proximity(CalorieItem::ChickenWrap),
        scone: proximity(CalorieItem::Scone),
        tortilla: proximity(CalorieItem::Tortilla),
        turkey_sandwich: proximity(CalorieItem::TurkeySandwich),
        waffle: proximity(CalorieItem::Waffle),
    };
    let calorie_awareness_score = awareness_score(&item_proximity);

    CalorieAwareness {
        id: record.id,
        item_proximity,
        calorie_awareness_score,
        awareness_level: classify_awareness_level(calorie_awareness_score),
    }
}

/// Calorie-awareness table, in input order
pub fn calorie_awareness(records: &[RespondentRecord], parallel: bool) -> Vec<CalorieAwareness> {
    if parallel {
        records.par_iter().map(classify_calories).collect()
    } else {
        records.iter().map(classify_calories).collect()
    }
}

/// Bucket a weight against its gender's cutpoints
pub fn classify_actual_category(weight: f64, cutpoints: &WeightPercentiles) -> WeightCategory {
    if weight < cutpoints.p25 {
        WeightCategory::Underweight
    } else if weight < cutpoints.p75 {
        WeightCategory::Normal
    } else if weight < cutpoints.p90 {
        WeightCategory::Overweight
    } else {
        WeightCategory::Obese
    }
}

pub fn classify_perception_accuracy(
    perceived: Option<WeightCategory>,
    actual: WeightCategory,
) -> PerceptionAccuracy {
    let Some(perceived) = perceived else {
        return PerceptionAccuracy::Unspecified;
    };
    let distance = weight_category_ordinal(perceived).abs_diff(weight_category_ordinal(actual));
    PERCEPTION_DISTANCES
        .iter()
        .find(|(d, _)| *d == distance)
        .map(|(_, accuracy)| *accuracy)
        .unwrap_or(PerceptionAccuracy::FarOff)
}

/// A missing or non-finite guess is `WayOff`
pub fn classify_item_proximity(guess: Option<f64>, actual: f64) -> ItemProximity {
    let Some(guess) = guess.filter(|g| g.is_finite()) else {
        return ItemProximity::WayOff;
    };
    let distance = (guess - actual).abs();
    PROXIMITY_BOUNDS
        .iter()
        .find(|(bound, _)| distance <= *bound)
        .map(|(_, proximity)| *proximity)
        .unwrap_or(ItemProximity::WayOff)
}

/// Sum of item points, 0-15
pub fn awareness_score(proximities: &ItemProximities) -> u8 {
    CalorieItem::ALL
        .iter()
        .map(|item| proximity_points(proximities.get(*item)))
        .sum()
}

pub fn classify_awareness_level(score: u8) -> AwarenessLevel {
    AWARENESS_THRESHOLDS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, level)| *level)
        .unwrap_or(AwarenessLevel::Unaware)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn respondent(id: u32, weight: Option<f64>, perception: Option<&str>) -> RespondentRecord {
        RespondentRecord {
            id,
            gender: Gender::Female,
            weight,
            self_perception_weight: perception.map(str::to_string),
            guessed_calories_chicken_wrap: Some(610.0),
            guessed_calories_scone: Some(420.0),
            guessed_calories_tortilla: Some(1165.0),
            guessed_calories_turkey_sandwich: Some(1000.0),
            guessed_calories_waffle: None,
            income: None,
            healthy_feeling: None,
            covariates: BTreeMap::new(),
        }
    }

    fn cutpoints() -> WeightPercentiles {
        WeightPercentiles {
            gender: Gender::Female,
            p25: 120.0,
            p75: 160.0,
            p90: 190.0,
            sample_size: 10,
        }
    }

    #[test]
    fn test_actual_category_boundaries() {
        let c = cutpoints();
        assert_eq!(classify_actual_category(119.9, &c), WeightCategory::Underweight);
        assert_eq!(classify_actual_category(120.0, &c), WeightCategory::Normal);
        assert_eq!(classify_actual_category(160.0, &c), WeightCategory::Overweight);
        assert_eq!(classify_actual_category(190.0, &c), WeightCategory::Obese);
    }

    #[test]
    fn test_item_proximity_scenarios() {
        assert_eq!(classify_item_proximity(Some(610.0), 610.0), ItemProximity::VeryClose);
        assert_eq!(classify_item_proximity(Some(835.0), 610.0), ItemProximity::Close);
        assert_eq!(classify_item_proximity(Some(385.0), 610.0), ItemProximity::Close);
        assert_eq!(classify_item_proximity(Some(935.0), 610.0), ItemProximity::Off);
        assert_eq!(classify_item_proximity(Some(936.0), 610.0), ItemProximity::WayOff);
        assert_eq!(classify_item_proximity(None, 610.0), ItemProximity::WayOff);
        assert_eq!(classify_item_proximity(Some(f64::NAN), 610.0), ItemProximity::WayOff);
    }

    #[test]
    fn test_item_points() {
        assert_eq!(proximity_points(classify_item_proximity(Some(610.0), 610.0)), 3);
        assert_eq!(proximity_points(classify_item_proximity(Some(835.0), 610.0)), 2);
        assert_eq!(proximity_points(classify_item_proximity(Some(936.0), 610.0)), 0);
    }

    #[test]
    fn test_awareness_levels() {
        // [3, 3, 2, 2, 1] sums to 11
        let proximities = ItemProximities {
            chicken_wrap: ItemProximity::VeryClose,
            scone: ItemProximity::VeryClose,
            tortilla: ItemProximity::Close,
            turkey_sandwich: ItemProximity::Close,
            waffle: ItemProximity::Off,
        };
        let score = awareness_score(&proximities);
        assert_eq!(score, 11);
        assert_eq!(classify_awareness_level(score), AwarenessLevel::Aware);

        assert_eq!(classify_awareness_level(15), AwarenessLevel::VeryAware);
        assert_eq!(classify_awareness_level(13), AwarenessLevel::VeryAware);
        assert_eq!(classify_awareness_level(12), AwarenessLevel::Aware);
        assert_eq!(classify_awareness_level(7), AwarenessLevel::SomewhatAware);
        assert_eq!(classify_awareness_level(6), AwarenessLevel::Unaware);
        assert_eq!(classify_awareness_level(0), AwarenessLevel::Unaware);
    }

    #[test]
    fn test_perception_accuracy() {
        assert_eq!(
            classify_perception_accuracy(Some(WeightCategory::Normal), WeightCategory::Obese),
            PerceptionAccuracy::FarOff
        );
        assert_eq!(
            classify_perception_accuracy(Some(WeightCategory::Normal), WeightCategory::Overweight),
            PerceptionAccuracy::Close
        );
        assert_eq!(
            classify_perception_accuracy(Some(WeightCategory::Obese), WeightCategory::Obese),
            PerceptionAccuracy::VeryClose
        );
        assert_eq!(
            classify_perception_accuracy(None, WeightCategory::Obese),
            PerceptionAccuracy::Unspecified
        );
    }

    #[test]
    fn test_classify_weight() {
        let table = WeightPercentileTable::compute(&[
            respondent(1, Some(100.0), None),
            respondent(2, Some(200.0), None),
        ]);
        let classifier = Classifier::new(&table);

        // p25 = 125, p75 = 175, p90 = 190
        let result = classifier
            .classify_weight(&respondent(3, Some(150.0), Some("Just Right")))
            .unwrap();
        assert_eq!(result.actual_category, WeightCategory::Normal);
        assert_eq!(result.perceived_category, Some(WeightCategory::Normal));
        assert_eq!(result.perception_accuracy, PerceptionAccuracy::VeryClose);

        let unknown = classifier
            .classify_weight(&respondent(4, Some(150.0), Some("no idea")))
            .unwrap();
        assert_eq!(unknown.perceived_category, None);
        assert_eq!(unknown.perception_accuracy, PerceptionAccuracy::Unspecified);

        assert!(classifier.classify_weight(&respondent(5, None, Some("slim"))).is_none());
    }

    #[test]
    fn test_classify_calories_missing_guess() {
        let awareness = classify_calories(&respondent(1, None, None));
        // 610 exact (3), 420 exact (3), tortilla +225 (2), turkey +310 (1), waffle missing (0)
        assert_eq!(awareness.item_proximity.waffle, ItemProximity::WayOff);
        assert_eq!(awareness.item_proximity.turkey_sandwich, ItemProximity::Off);
        assert_eq!(awareness.calorie_awareness_score, 9);
        assert_eq!(awareness.awareness_level, AwarenessLevel::SomewhatAware);
    }

    #[test]
    fn test_join_drops_records_without_weight() {
        let records = vec![
            respondent(1, Some(100.0), Some("slim")),
            respondent(2, None, Some("slim")),
            respondent(3, Some(200.0), None),
        ];
        let table = WeightPercentileTable::compute(&records);
        let classifier = Classifier::new(&table);

        let weights = classifier.weight_perception(&records, false);
        let calories = calorie_awareness(&records, false);
        assert_eq!(weights.len(), 2);
        assert_eq!(calories.len(), 3);

        let classified = Classifier::join(&records, &weights, &calories);
        let ids: Vec<u32> = classified.iter().map(|c| c.respondent.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let records: Vec<_> = (0..50)
            .map(|i| respondent(i, Some(100.0 + i as f64), Some("very fit")))
            .collect();
        let table = WeightPercentileTable::compute(&records);
        let classifier = Classifier::new(&table);

        assert_eq!(
            classifier.weight_perception(&records, true),
            classifier.weight_perception(&records, false)
        );
        assert_eq!(calorie_awareness(&records, true), calorie_awareness(&records, false));
    }

    fn proximity_strategy() -> impl Strategy<Value = Option<f64>> {
        proptest::option::of(0.0f64..2500.0)
    }

    proptest! {
        #[test]
        fn awareness_score_is_sum_of_item_points(
            wrap in proximity_strategy(),
            scone in proximity_strategy(),
            tortilla in proximity_strategy(),
            turkey in proximity_strategy(),
            waffle in proximity_strategy(),
        ) {
            let mut record = respondent(1, None, None);
            record.guessed_calories_chicken_wrap = wrap;
            record.guessed_calories_scone = scone;
            record.guessed_calories_tortilla = tortilla;
            record.guessed_calories_turkey_sandwich = turkey;
            record.guessed_calories_waffle = waffle;

            let awareness = classify_calories(&record);
            let points: Vec<u8> = CalorieItem::ALL
                .iter()
                .map(|item| proximity_points(awareness.item_proximity.get(*item)))
                .collect();

            prop_assert!(points.iter().all(|p| *p <= 3));
            prop_assert!(awareness.calorie_awareness_score <= 15);
            prop_assert_eq!(awareness.calorie_awareness_score, points.iter().sum::<u8>());
        }
    }
}
