//! Alignment scoring
//!
//! Converts awareness level and perception accuracy into ordinal scores and
//! measures how far apart they are. Alignment is undefined without a perceived
//! weight category, so those records never reach the scored table.

use crate::reference::{awareness_level_ordinal, perception_accuracy_ordinal, ALIGNMENT_DIFFERENCES};
use crate::types::{AlignmentLevel, ClassifiedRecord, ScoredRecord};
use rayon::prelude::*;

/// Scorer for classified records
pub struct Scorer;

impl Scorer {
    /// Score a classified record, or `None` when it has no perceived category
    pub fn score(classified: &ClassifiedRecord) -> Option<ScoredRecord> {
        if classified.perceived_category.is_none() {
            return None;
        }

        let awareness_level_score = awareness_level_ordinal(classified.awareness_level);
        let perception_level_score = perception_accuracy_ordinal(classified.perception_accuracy);
        let score_difference = awareness_level_score.abs_diff(perception_level_score);

        Some(ScoredRecord {
            classified: classified.clone(),
            awareness_level_score,
            perception_level_score,
            score_difference,
            alignment_level: classify_alignment(score_difference),
        })
    }

    /// Scored table, in input order
    pub fn score_all(classified: &[ClassifiedRecord], parallel: bool) -> Vec<ScoredRecord> {
        if parallel {
            classified.par_iter().filter_map(Self::score).collect()
        } else {
            classified.iter().filter_map(Self::score).collect()
        }
    }
}

pub fn classify_alignment(score_difference: u8) -> AlignmentLevel {
    ALIGNMENT_DIFFERENCES
        .iter()
        .find(|(d, _)| *d == score_difference)
        .map(|(_, level)| *level)
        .unwrap_or(AlignmentLevel::SevereMisalignment)
}
