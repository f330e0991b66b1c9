use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Learner subscription plan. Owned by the billing system; read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Standard,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Standard => "standard",
            SubscriptionTier::Premium => "premium",
        }
    }
}

/// A lesson row within a course, ordered by `order_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub order_index: i32,
    /// Open lessons skip the prerequisite check for themselves only.
    #[serde(default)]
    pub is_open: bool,
    /// A lesson with an associated quiz requires a quiz pass to keep the
    /// unlock chain open.
    #[serde(default)]
    pub quiz_id: Option<String>,
}

impl Lesson {
    pub fn requires_quiz(&self) -> bool {
        self.quiz_id.is_some()
    }
}

/// Per (learner, lesson) progress row. Created lazily, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgressRecord {
    pub learner_id: String,
    pub lesson_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub quiz_passed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Subscription row as the billing sync writes it.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRecord {
    pub learner_id: String,
    pub tier: SubscriptionTier,
}

/// Computed unlock state for a single lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonState {
    pub id: String,
    pub title: String,
    pub order_index: i32,
    pub is_unlocked: bool,
    pub is_completed: bool,
    pub is_locked_by_subscription: bool,
}

/// Full course-progress response for one learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub lessons: Vec<LessonState>,
    pub overall_progress_pct: f64,
    pub tier: SubscriptionTier,
}
