//! Placement estimator: difficulty walk and final level scoring.
//!
//! The walk is a bounded step over the six CEFR bands driven by running
//! correctness, not an item-response-theory model. Scoring weights later and
//! harder answers more and maps the weighted correctness ratio onto the
//! highest band whose threshold it clears.

use crate::models::placement::{AnswerRecord, CefrLevel, Confidence};

/// Fixed attempt length.
pub const TOTAL_QUESTIONS: usize = 8;

/// Band the first question is drawn from.
pub const FIRST_BAND: CefrLevel = CefrLevel::B1;

/// Consecutive correct answers required before the band steps up.
pub const STREAK_TO_STEP_UP: u32 = 2;

/// Minimum weighted-correctness ratio required to place at each band.
/// A1 is the floor: every completed attempt places at least there.
const LEVEL_THRESHOLDS: [(CefrLevel, f64); 6] = [
    (CefrLevel::A1, 0.0),
    (CefrLevel::A2, 0.25),
    (CefrLevel::B1, 0.40),
    (CefrLevel::B2, 0.55),
    (CefrLevel::C1, 0.70),
    (CefrLevel::C2, 0.85),
];

const HIGH_CONFIDENCE_MARGIN: f64 = 0.12;
const MEDIUM_CONFIDENCE_MARGIN: f64 = 0.05;

/// Outcome of a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementResult {
    pub level: CefrLevel,
    pub confidence: Confidence,
    pub correct_answers: u32,
}

/// Advance the difficulty walk after one answer.
///
/// Returns the band for the next question and the new streak. The streak
/// resets whenever the band moves, so stepping up always takes
/// [`STREAK_TO_STEP_UP`] fresh correct answers.
pub fn advance_band(current: CefrLevel, streak: u32, correct: bool) -> (CefrLevel, u32) {
    if correct {
        let streak = streak + 1;
        if streak >= STREAK_TO_STEP_UP {
            (current.step_up(), 0)
        } else {
            (current, streak)
        }
    } else {
        (current.step_down(), 0)
    }
}

/// Weight of the answer at `position` (0-based) asked at `band`. Harder
/// bands and later positions both increase the weight, so the tail of the
/// quiz dominates the estimate.
pub fn answer_weight(position: usize, band: CefrLevel) -> f64 {
    (band.rank() + 1) as f64 * (1.0 + position as f64 / TOTAL_QUESTIONS as f64)
}

/// Map a full answer history onto a final CEFR level with confidence.
///
/// The ratio is monotone in correctness for a fixed question path: turning
/// any incorrect answer correct can only add weight to the numerator, so the
/// resulting level never decreases.
pub fn estimate_level(answers: &[AnswerRecord]) -> PlacementResult {
    let mut total_weight = 0.0;
    let mut correct_weight = 0.0;
    let mut correct_answers = 0u32;

    for (position, answer) in answers.iter().enumerate() {
        let weight = answer_weight(position, answer.band);
        total_weight += weight;
        if answer.correct {
            correct_weight += weight;
            correct_answers += 1;
        }
    }

    let ratio = if total_weight > 0.0 {
        correct_weight / total_weight
    } else {
        0.0
    };

    let mut level = CefrLevel::A1;
    let mut cleared_threshold = 0.0;
    for (band, threshold) in LEVEL_THRESHOLDS {
        if ratio >= threshold {
            level = band;
            cleared_threshold = threshold;
        }
    }

    let margin = ratio - cleared_threshold;
    let confidence = if margin >= HIGH_CONFIDENCE_MARGIN {
        Confidence::High
    } else if margin >= MEDIUM_CONFIDENCE_MARGIN {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    PlacementResult {
        level,
        confidence,
        correct_answers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn answer(band: CefrLevel, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: "q".to_string(),
            band,
            option_index: 0,
            correct,
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn two_correct_in_a_row_step_the_band_up() {
        let (band, streak) = advance_band(CefrLevel::B1, 0, true);
        assert_eq!((band, streak), (CefrLevel::B1, 1));
        let (band, streak) = advance_band(band, streak, true);
        assert_eq!((band, streak), (CefrLevel::B2, 0));
    }

    #[test]
    fn incorrect_answer_steps_down_and_resets_streak() {
        let (band, streak) = advance_band(CefrLevel::B2, 1, false);
        assert_eq!((band, streak), (CefrLevel::B1, 0));
    }

    #[test]
    fn walk_is_clamped_to_the_scale() {
        let (band, _) = advance_band(CefrLevel::A1, 0, false);
        assert_eq!(band, CefrLevel::A1);
        let (band, _) = advance_band(CefrLevel::C2, 1, true);
        assert_eq!(band, CefrLevel::C2);
    }

    #[test]
    fn later_and_harder_answers_weigh_more() {
        assert!(answer_weight(7, CefrLevel::B1) > answer_weight(0, CefrLevel::B1));
        assert!(answer_weight(3, CefrLevel::C1) > answer_weight(3, CefrLevel::A2));
    }

    #[test]
    fn all_wrong_places_at_the_floor_with_low_confidence() {
        let answers: Vec<_> = (0..TOTAL_QUESTIONS)
            .map(|_| answer(CefrLevel::A1, false))
            .collect();
        let result = estimate_level(&answers);
        assert_eq!(result.level, CefrLevel::A1);
        assert_eq!(result.confidence, Confidence::Low);
        assert_eq!(result.correct_answers, 0);
    }

    #[test]
    fn all_correct_places_at_the_top_with_high_confidence() {
        let answers: Vec<_> = (0..TOTAL_QUESTIONS)
            .map(|_| answer(CefrLevel::C2, true))
            .collect();
        let result = estimate_level(&answers);
        assert_eq!(result.level, CefrLevel::C2);
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.correct_answers, TOTAL_QUESTIONS as u32);
    }

    #[test]
    fn confidence_reflects_distance_from_the_threshold() {
        // Uniform band, three early misses then five late hits lands just
        // past the C1 threshold: barely cleared, so confidence is low.
        let mut answers: Vec<_> = (0..3).map(|_| answer(CefrLevel::B1, false)).collect();
        answers.extend((0..5).map(|_| answer(CefrLevel::B1, true)));
        let result = estimate_level(&answers);
        assert_eq!(result.level, CefrLevel::C1);
        assert_eq!(result.confidence, Confidence::Low);
    }
}
