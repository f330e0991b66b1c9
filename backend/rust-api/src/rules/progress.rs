//! Progress gate: per-lesson unlock evaluation.
//!
//! Three independent constraints combine per lesson: the sequential
//! completion chain, quiz-pass requirements on the predecessor, and the
//! subscription-tier ceiling. When progress rows are unavailable the gate
//! fails closed and reports everything locked; an unlock must never come
//! from an optimistic default.

use std::collections::HashMap;

use crate::models::progress::{
    CourseProgress, Lesson, LessonProgressRecord, LessonState, SubscriptionTier,
};

/// Compute the unlock state of every lesson in a course for one learner.
///
/// `lessons` may arrive in any order; they are evaluated sorted by
/// `order_index`. `progress` is `None` when the progress rows could not be
/// loaded, which locks the whole course (fail-closed).
pub fn compute_course_progress(
    lessons: &[Lesson],
    progress: Option<&[LessonProgressRecord]>,
    tier: SubscriptionTier,
    free_lesson_ceiling: usize,
) -> CourseProgress {
    let mut ordered: Vec<&Lesson> = lessons.iter().collect();
    ordered.sort_by_key(|lesson| lesson.order_index);

    let Some(progress) = progress else {
        return all_locked(&ordered, tier);
    };

    let by_lesson: HashMap<&str, &LessonProgressRecord> = progress
        .iter()
        .map(|record| (record.lesson_id.as_str(), record))
        .collect();

    let mut states = Vec::with_capacity(ordered.len());
    let mut completed_count = 0usize;
    let mut chain_open = true;

    for (position, lesson) in ordered.iter().enumerate() {
        let record = by_lesson.get(lesson.id.as_str());
        let is_completed = record.map(|r| r.completed).unwrap_or(false);
        let quiz_passed = record.map(|r| r.quiz_passed).unwrap_or(false);

        let locked_by_subscription =
            tier == SubscriptionTier::Free && position >= free_lesson_ceiling;

        // Open lessons bypass the prerequisite chain for themselves only.
        let is_unlocked = (chain_open || lesson.is_open) && !locked_by_subscription;

        // The chain stays open past this lesson only once it is completed,
        // including its quiz when it has one. An open-but-incomplete lesson
        // still closes the chain for its successors.
        chain_open = is_completed && (!lesson.requires_quiz() || quiz_passed);

        if is_completed {
            completed_count += 1;
        }

        states.push(LessonState {
            id: lesson.id.clone(),
            title: lesson.title.clone(),
            order_index: lesson.order_index,
            is_unlocked,
            is_completed,
            is_locked_by_subscription: locked_by_subscription,
        });
    }

    let overall_progress_pct = if states.is_empty() {
        0.0
    } else {
        completed_count as f64 / states.len() as f64 * 100.0
    };

    CourseProgress {
        lessons: states,
        overall_progress_pct,
        tier,
    }
}

fn all_locked(ordered: &[&Lesson], tier: SubscriptionTier) -> CourseProgress {
    let lessons = ordered
        .iter()
        .map(|lesson| LessonState {
            id: lesson.id.clone(),
            title: lesson.title.clone(),
            order_index: lesson.order_index,
            is_unlocked: false,
            is_completed: false,
            is_locked_by_subscription: false,
        })
        .collect();

    CourseProgress {
        lessons,
        overall_progress_pct: 0.0,
        tier,
    }
}
