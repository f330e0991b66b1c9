use chrono::Utc;
use linguahub_api::models::progress::{Lesson, LessonProgressRecord, SubscriptionTier};
use linguahub_api::rules::progress::compute_course_progress;
use rand::Rng;

fn lesson(id: &str, order_index: i32, is_open: bool, quiz: bool) -> Lesson {
    Lesson {
        id: id.to_string(),
        course_id: "spanish-101".to_string(),
        title: format!("Lesson {}", id),
        order_index,
        is_open,
        quiz_id: quiz.then(|| format!("quiz-{}", id)),
    }
}

fn record(lesson_id: &str, completed: bool, quiz_passed: bool) -> LessonProgressRecord {
    LessonProgressRecord {
        learner_id: "learner-1".to_string(),
        lesson_id: lesson_id.to_string(),
        completed,
        quiz_passed,
        updated_at: Utc::now(),
    }
}

#[test]
fn five_lesson_course_combines_chain_quiz_and_ceiling() {
    // Lessons 1 and 2 done, lesson 2 carries a passed quiz, so the chain
    // reaches lesson 3; the free ceiling of 3 locks the tail regardless.
    let lessons = vec![
        lesson("l1", 0, false, false),
        lesson("l2", 1, false, true),
        lesson("l3", 2, false, false),
        lesson("l4", 3, false, false),
        lesson("l5", 4, false, false),
    ];
    let progress = vec![record("l1", true, false), record("l2", true, true)];

    let out = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Free, 3);

    let unlocked: Vec<bool> = out.lessons.iter().map(|l| l.is_unlocked).collect();
    assert_eq!(unlocked, vec![true, true, true, false, false]);

    assert!(out.lessons[3].is_locked_by_subscription);
    assert!(out.lessons[4].is_locked_by_subscription);
    assert_eq!(out.overall_progress_pct, 40.0);
    assert_eq!(out.tier, SubscriptionTier::Free);
}

#[test]
fn premium_tier_ignores_the_ceiling() {
    let lessons: Vec<_> = (0..6)
        .map(|i| lesson(&format!("l{}", i), i, false, false))
        .collect();
    let progress: Vec<_> = (0..6)
        .map(|i| record(&format!("l{}", i), true, false))
        .collect();

    let out = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Premium, 3);
    assert!(out.lessons.iter().all(|l| l.is_unlocked));
    assert!(out.lessons.iter().all(|l| !l.is_locked_by_subscription));
    assert_eq!(out.overall_progress_pct, 100.0);
}

#[test]
fn unreadable_progress_locks_every_lesson() {
    let lessons: Vec<_> = (0..10)
        .map(|i| lesson(&format!("l{}", i), i, i % 3 == 0, false))
        .collect();

    let out = compute_course_progress(&lessons, None, SubscriptionTier::Premium, 3);
    assert_eq!(out.lessons.len(), 10);
    assert!(out.lessons.iter().all(|l| !l.is_unlocked));
    assert!(out.lessons.iter().all(|l| !l.is_completed));
    assert_eq!(out.overall_progress_pct, 0.0);
}

#[test]
fn evaluation_is_deterministic_for_identical_inputs() {
    let lessons = vec![
        lesson("a", 0, false, true),
        lesson("b", 1, false, false),
        lesson("c", 2, true, false),
    ];
    let progress = vec![record("a", true, true), record("b", true, false)];

    let first = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Standard, 3);
    let second = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Standard, 3);
    assert_eq!(first, second);
}

#[test]
fn input_order_does_not_change_the_outcome() {
    let mut rng = rand::rng();

    let lessons: Vec<_> = (0..8)
        .map(|i| lesson(&format!("l{}", i), i, false, i % 2 == 0))
        .collect();
    let progress: Vec<_> = (0..8)
        .map(|i| {
            let done = rng.random_bool(0.6);
            record(&format!("l{}", i), done, done && rng.random_bool(0.7))
        })
        .collect();

    let baseline = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Free, 3);

    let mut shuffled = lessons.clone();
    shuffled.reverse();
    shuffled.swap(0, 3);
    let reordered = compute_course_progress(&shuffled, Some(&progress), SubscriptionTier::Free, 3);

    assert_eq!(baseline, reordered);
}

/// A non-open lesson must never unlock while its predecessor is incomplete
/// or missing a required quiz pass, whatever the rest of the inputs are.
#[test]
fn chain_never_unlocks_past_an_incomplete_predecessor() {
    let mut rng = rand::rng();

    for _ in 0..300 {
        let count: i32 = rng.random_range(2..9);
        let lessons: Vec<_> = (0..count)
            .map(|i| {
                lesson(
                    &format!("l{}", i),
                    i,
                    rng.random_bool(0.2),
                    rng.random_bool(0.4),
                )
            })
            .collect();
        let progress: Vec<_> = (0..count)
            .map(|i| {
                record(
                    &format!("l{}", i),
                    rng.random_bool(0.5),
                    rng.random_bool(0.5),
                )
            })
            .collect();

        let out = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Premium, 3);

        for i in 1..out.lessons.len() {
            let state = &out.lessons[i];
            if state.is_unlocked && !lessons[i].is_open {
                let prev_lesson = &lessons[i - 1];
                let prev_record = progress.iter().find(|r| r.lesson_id == prev_lesson.id);
                let prev_done = prev_record.map(|r| r.completed).unwrap_or(false);
                let prev_quiz_ok = !prev_lesson.requires_quiz()
                    || prev_record.map(|r| r.quiz_passed).unwrap_or(false);
                assert!(
                    prev_done && prev_quiz_ok,
                    "lesson {} unlocked past an unfinished predecessor",
                    state.id
                );
            }
        }
    }
}

#[test]
fn free_ceiling_counts_positions_not_order_index_values() {
    // Sparse order_index values; the ceiling applies to the sorted position.
    let lessons = vec![
        lesson("a", 10, false, false),
        lesson("b", 20, false, false),
        lesson("c", 30, false, false),
        lesson("d", 40, false, false),
    ];
    let progress: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|id| record(id, true, false))
        .collect();

    let out = compute_course_progress(&lessons, Some(&progress), SubscriptionTier::Free, 3);
    assert!(!out.lessons[2].is_locked_by_subscription);
    assert!(out.lessons[3].is_locked_by_subscription);
}
