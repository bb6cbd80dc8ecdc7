//! Aggregate views over the scored table
//!
//! Each view is a pure group-by recomputed in full from the scored records
//! (and, for comfort foods, the comfort-food entries joined on `id`).
//! Averages and proportions are rounded half away from zero to 2 places.

use crate::types::{
    AlignmentLevel, AlignmentRow, ComfortFoodDetailRow, ComfortFoodEntry, ComfortFoodRankRow,
    Gender, IncomeAwarenessRow, IncomeBracket, PerceptionAccuracy, PerceptionAwarenessRow,
    ScoredRecord,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::{Add, Sub};
use tracing::debug;

/// Exact fraction with a positive denominator.
///
/// Means and proportions stay exact until the final rounding, so a value that
/// is halfway in decimal (1.005, 0.285) rounds up instead of following its
/// binary approximation down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    numer: i128,
    denom: i128,
}

impl Ratio {
    /// `denom` must be non-zero
    pub fn new(numer: i128, denom: i128) -> Self {
        let sign = if denom < 0 { -1 } else { 1 };
        let divisor = gcd(numer, denom).max(1);
        Self {
            numer: sign * numer / divisor,
            denom: sign * denom / divisor,
        }
    }

    pub fn div_int(self, divisor: i128) -> Self {
        Self::new(self.numer, self.denom * divisor)
    }

    /// Round half away from zero to 2 decimal places
    pub fn round2(self) -> f64 {
        let scaled = self.numer.abs() * 100;
        let cents = (2 * scaled + self.denom) / (2 * self.denom);
        let cents = if self.numer < 0 { -cents } else { cents };
        cents as f64 / 100.0
    }
}

impl Add for Ratio {
    type Output = Ratio;

    fn add(self, other: Ratio) -> Ratio {
        Ratio::new(
            self.numer * other.denom + other.numer * self.denom,
            self.denom * other.denom,
        )
    }
}

impl Sub for Ratio {
    type Output = Ratio;

    fn sub(self, other: Ratio) -> Ratio {
        Ratio::new(
            self.numer * other.denom - other.numer * self.denom,
            self.denom * other.denom,
        )
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// `numerator / denominator` rounded half away from zero to 2 decimal places
pub fn round2(numerator: i128, denominator: i128) -> f64 {
    Ratio::new(numerator, denominator).round2()
}

/// Healthy-feeling values are summed in millionths so their mean is exact
const HEALTHY_SCALE: i128 = 1_000_000;

/// Dense rank of `value` among `distinct_values`: 1 + number of strictly
/// greater distinct values.
pub fn dense_rank(value: usize, distinct_values: &BTreeSet<usize>) -> u32 {
    1 + distinct_values.range(value + 1..).count() as u32
}

#[derive(Default)]
struct ScoreSum {
    count: usize,
    total: u64,
}

impl ScoreSum {
    fn add(&mut self, score: u8) {
        self.count += 1;
        self.total += u64::from(score);
    }

    fn mean(&self) -> Ratio {
        Ratio::new(i128::from(self.total), self.count as i128)
    }
}

/// Awareness by gender and perception-accuracy bracket (Unspecified excluded).
///
/// The gender figure is a mean of bracket means, not a mean over respondents:
/// the two differ whenever brackets have unequal sizes.
pub fn perception_by_gender(scored: &[ScoredRecord]) -> Vec<PerceptionAwarenessRow> {
    let mut brackets: BTreeMap<(Gender, PerceptionAccuracy), ScoreSum> = BTreeMap::new();
    for record in scored {
        let accuracy = record.classified.perception_accuracy;
        if accuracy == PerceptionAccuracy::Unspecified {
            continue;
        }
        brackets
            .entry((record.gender(), accuracy))
            .or_default()
            .add(record.classified.calorie_awareness_score);
    }

    let mut bracket_means: BTreeMap<Gender, Vec<Ratio>> = BTreeMap::new();
    for ((gender, _), sum) in &brackets {
        bracket_means.entry(*gender).or_default().push(sum.mean());
    }
    let gender_means: BTreeMap<Gender, Ratio> = bracket_means
        .into_iter()
        .filter_map(|(gender, means)| {
            let count = means.len() as i128;
            let total = means.into_iter().reduce(|a, b| a + b)?;
            Some((gender, total.div_int(count)))
        })
        .collect();

    brackets
        .into_iter()
        .map(|((gender, perception_accuracy), sum)| {
            let mean = sum.mean();
            let gender_mean = gender_means.get(&gender).copied().unwrap_or(mean);
            PerceptionAwarenessRow {
                gender,
                perception_accuracy,
                count: sum.count,
                avg_awareness_score: mean.round2(),
                gender_avg_of_bracket_means: gender_mean.round2(),
                deviation_from_gender_avg: (mean - gender_mean).round2(),
            }
        })
        .collect()
}

/// Awareness by income bracket, lowest bracket first; absent income excluded
pub fn awareness_by_income(scored: &[ScoredRecord]) -> Vec<IncomeAwarenessRow> {
    let mut brackets: BTreeMap<IncomeBracket, ScoreSum> = BTreeMap::new();
    for record in scored {
        if let Some(income) = record.classified.respondent.income {
            brackets
                .entry(income)
                .or_default()
                .add(record.classified.calorie_awareness_score);
        }
    }

    brackets
        .into_iter()
        .map(|(income, sum)| IncomeAwarenessRow {
            income,
            count: sum.count,
            avg_awareness_score: sum.mean().round2(),
        })
        .collect()
}

/// Alignment-level distribution per gender. Every gender with scored records
/// gets all four levels in display order, zero counts included.
pub fn alignment_by_gender(scored: &[ScoredRecord]) -> Vec<AlignmentRow> {
    let mut counts: BTreeMap<(Gender, AlignmentLevel), usize> = BTreeMap::new();
    let mut totals: BTreeMap<Gender, usize> = BTreeMap::new();
    for record in scored {
        *counts.entry((record.gender(), record.alignment_level)).or_default() += 1;
        *totals.entry(record.gender()).or_default() += 1;
    }

    totals
        .into_iter()
        .flat_map(|(gender, total)| {
            AlignmentLevel::ALL
                .into_iter()
                .map(move |alignment_level| (gender, total, alignment_level))
        })
        .map(|(gender, total, alignment_level)| {
            let count = counts.get(&(gender, alignment_level)).copied().unwrap_or(0);
            AlignmentRow {
                gender,
                alignment_level,
                count,
                proportion: round2(count as i128, total as i128),
            }
        })
        .collect()
}

/// Comfort-food entries inner-joined to scored records, blanks skipped
fn join_comfort_foods<'a>(
    scored: &'a [ScoredRecord],
    entries: &'a [ComfortFoodEntry],
) -> Vec<(&'a ScoredRecord, &'a ComfortFoodEntry, &'a str)> {
    let by_id: HashMap<u32, &ScoredRecord> = scored.iter().map(|r| (r.id(), r)).collect();

    let joined: Vec<_> = entries
        .iter()
        .filter_map(|entry| {
            let category = entry.mapped_category()?;
            let record = by_id.get(&entry.id)?;
            Some((*record, entry, category))
        })
        .collect();

    if joined.len() < entries.len() {
        debug!(
            dropped = entries.len() - joined.len(),
            "comfort-food entries without a category or scored respondent"
        );
    }
    joined
}

#[derive(Default)]
struct FoodTally {
    count: usize,
    healthy_total: i128,
    healthy_count: usize,
}

/// Comfort-food popularity per gender with dense popularity rank
pub fn comfort_food_by_gender(
    scored: &[ScoredRecord],
    entries: &[ComfortFoodEntry],
) -> Vec<ComfortFoodRankRow> {
    let mut tallies: BTreeMap<(Gender, String), FoodTally> = BTreeMap::new();
    for (record, _, category) in join_comfort_foods(scored, entries) {
        let tally = tallies
            .entry((record.gender(), category.to_string()))
            .or_default();
        tally.count += 1;
        if let Some(feeling) = record.classified.respondent.healthy_feeling {
            tally.healthy_total += (feeling * HEALTHY_SCALE as f64).round() as i128;
            tally.healthy_count += 1;
        }
    }

    let mut distinct_counts: BTreeMap<Gender, BTreeSet<usize>> = BTreeMap::new();
    for ((gender, _), tally) in &tallies {
        distinct_counts.entry(*gender).or_default().insert(tally.count);
    }

    let mut rows: Vec<ComfortFoodRankRow> = tallies
        .into_iter()
        .map(|((gender, comfort_food_mapped), tally)| {
            let popularity_rank = distinct_counts
                .get(&gender)
                .map(|counts| dense_rank(tally.count, counts))
                .unwrap_or(1);
            let avg_healthy_feeling = (tally.healthy_count > 0).then(|| {
                round2(tally.healthy_total, tally.healthy_count as i128 * HEALTHY_SCALE)
            });
            ComfortFoodRankRow {
                gender,
                comfort_food_mapped,
                count: tally.count,
                avg_healthy_feeling,
                popularity_rank,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.gender, a.popularity_rank, &a.comfort_food_mapped)
            .cmp(&(b.gender, b.popularity_rank, &b.comfort_food_mapped))
    });
    rows
}

/// One row per (respondent, comfort food) pair, in entry order
pub fn comfort_food_detail(
    scored: &[ScoredRecord],
    entries: &[ComfortFoodEntry],
) -> Vec<ComfortFoodDetailRow> {
    join_comfort_foods(scored, entries)
        .into_iter()
        .map(|(record, entry, category)| {
            let respondent = &record.classified.respondent;
            ComfortFoodDetailRow {
                id: respondent.id,
                gender: respondent.gender,
                income: respondent.income,
                income_group: respondent.income.map(|i| i.group()),
                comfort_food: entry.comfort_food.clone(),
                comfort_food_mapped: category.to_string(),
                healthy_feeling: respondent.healthy_feeling,
                calorie_awareness_score: record.classified.calorie_awareness_score,
                awareness_level: record.classified.awareness_level,
                perception_accuracy: record.classified.perception_accuracy,
                alignment_level: record.alignment_level,
            }
        })
        .collect()
}
