use chrono::Utc;
use linguahub_api::models::placement::{AnswerRecord, CefrLevel, Confidence, PlacementAttempt};
use linguahub_api::rules::placement::{
    advance_band, estimate_level, FIRST_BAND, TOTAL_QUESTIONS,
};
use linguahub_api::services::placement_service::{
    ensure_accepting, PlacementError, ATTEMPT_TTL_SECONDS,
};
use rand::Rng;

fn answer(band: CefrLevel, correct: bool) -> AnswerRecord {
    AnswerRecord {
        question_id: "q".to_string(),
        band,
        option_index: 0,
        correct,
        answered_at: Utc::now(),
    }
}

/// Run the difficulty walk over a correctness vector the way the service
/// does, returning the answer history it would produce.
fn simulate_attempt(outcomes: &[bool]) -> Vec<AnswerRecord> {
    let mut band = FIRST_BAND;
    let mut streak = 0;
    let mut answers = Vec::with_capacity(outcomes.len());

    for &correct in outcomes {
        answers.push(answer(band, correct));
        let (next_band, next_streak) = advance_band(band, streak, correct);
        band = next_band;
        streak = next_streak;
    }

    answers
}

#[test]
fn attempts_are_exactly_eight_questions() {
    assert_eq!(TOTAL_QUESTIONS, 8);
}

fn attempt_after(outcomes: &[bool]) -> PlacementAttempt {
    let now = Utc::now();
    let answers = simulate_attempt(outcomes);
    let completed = answers.len() >= TOTAL_QUESTIONS;

    PlacementAttempt {
        id: "attempt-1".to_string(),
        learner_id: "learner-1".to_string(),
        started_at: now,
        expires_at: now + chrono::Duration::seconds(ATTEMPT_TTL_SECONDS),
        questions: Vec::new(),
        answers,
        band: FIRST_BAND,
        streak: 0,
        completed,
    }
}

#[test]
fn ninth_submission_on_a_finished_attempt_is_rejected() {
    let attempt = attempt_after(&[true; 8]);
    assert!(attempt.completed);

    assert!(matches!(
        ensure_accepting(&attempt, "learner-1", Utc::now()),
        Err(PlacementError::InvalidState)
    ));
}

#[test]
fn submission_after_the_ttl_window_is_expired() {
    let attempt = attempt_after(&[true, false, true]);
    let past_ttl = attempt.started_at + chrono::Duration::seconds(ATTEMPT_TTL_SECONDS + 1);

    assert!(matches!(
        ensure_accepting(&attempt, "learner-1", past_ttl),
        Err(PlacementError::AttemptExpired)
    ));

    // Within the window the same attempt still accepts answers.
    assert!(ensure_accepting(&attempt, "learner-1", Utc::now()).is_ok());
}

#[test]
fn perfect_run_places_at_c2_with_high_confidence() {
    let answers = simulate_attempt(&[true; 8]);
    assert_eq!(answers.len(), TOTAL_QUESTIONS);

    let result = estimate_level(&answers);
    assert_eq!(result.level, CefrLevel::C2);
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(result.correct_answers, 8);
}

#[test]
fn failed_run_places_at_a1() {
    let answers = simulate_attempt(&[false; 8]);
    let result = estimate_level(&answers);
    assert_eq!(result.level, CefrLevel::A1);
    assert_eq!(result.correct_answers, 0);
}

#[test]
fn walk_never_leaves_the_cefr_scale() {
    let mut rng = rand::rng();

    for _ in 0..500 {
        let outcomes: Vec<bool> = (0..TOTAL_QUESTIONS).map(|_| rng.random_bool(0.5)).collect();
        for record in simulate_attempt(&outcomes) {
            assert!(record.band >= CefrLevel::A1 && record.band <= CefrLevel::C2);
        }
    }
}

#[test]
fn two_correct_answers_raise_difficulty_one_misstep_lowers_it() {
    let answers = simulate_attempt(&[true, true, false, true, true]);
    let bands: Vec<CefrLevel> = answers.iter().map(|a| a.band).collect();
    assert_eq!(
        bands,
        vec![
            CefrLevel::B1,
            CefrLevel::B1,
            CefrLevel::B2,
            CefrLevel::B1,
            CefrLevel::B1,
        ]
    );
}

/// Holding the question path fixed, turning any miss into a hit must never
/// lower the estimated level.
#[test]
fn level_is_monotone_in_correctness_for_a_fixed_path() {
    let mut rng = rand::rng();

    for _ in 0..500 {
        let bands: Vec<CefrLevel> = (0..TOTAL_QUESTIONS)
            .map(|_| CefrLevel::ALL[rng.random_range(0..CefrLevel::ALL.len())])
            .collect();
        let outcomes: Vec<bool> = (0..TOTAL_QUESTIONS).map(|_| rng.random_bool(0.5)).collect();

        let baseline: Vec<AnswerRecord> = bands
            .iter()
            .zip(&outcomes)
            .map(|(&band, &correct)| answer(band, correct))
            .collect();
        let before = estimate_level(&baseline);

        let misses: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| (!c).then_some(i))
            .collect();
        let Some(&flip) = misses.first() else {
            continue;
        };

        let mut improved = baseline.clone();
        improved[flip].correct = true;
        let after = estimate_level(&improved);

        assert!(
            after.level >= before.level,
            "flipping a miss to a hit lowered the level: {:?} -> {:?}",
            before.level,
            after.level
        );
    }
}

#[test]
fn weighted_scoring_favors_late_strong_finishes() {
    // Same number of correct answers on the same bands; the run that gets
    // them late scores at least as high as the run that gets them early.
    let bands = [CefrLevel::B1; 8];

    let early: Vec<AnswerRecord> = bands
        .iter()
        .enumerate()
        .map(|(i, &b)| answer(b, i < 4))
        .collect();
    let late: Vec<AnswerRecord> = bands
        .iter()
        .enumerate()
        .map(|(i, &b)| answer(b, i >= 4))
        .collect();

    assert!(estimate_level(&late).level >= estimate_level(&early).level);
}
