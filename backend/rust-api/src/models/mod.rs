use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod placement;
pub mod progress;

pub use placement::{
    AnswerRecord, CefrLevel, Confidence, PlacementAttempt, Question, QuestionView,
    StartAttemptResponse, SubmitAnswerRequest, SubmitAnswerResponse,
};
pub use progress::{
    CourseProgress, Lesson, LessonProgressRecord, LessonState, SubscriptionRecord,
    SubscriptionTier,
};

/// Learner profile row. Only the placement fields are touched here; the
/// rest of the document is owned by the account subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub display_name: String,
    /// Set exactly once by the first completed placement attempt.
    #[serde(default)]
    pub computed_level: Option<CefrLevel>,
    #[serde(default)]
    pub level_computed_at: Option<DateTime<Utc>>,
}
