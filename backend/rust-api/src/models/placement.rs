use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CEFR proficiency bands, ordered from beginner to mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// 0-based position within the band scale (A1 = 0, C2 = 5).
    pub fn rank(self) -> usize {
        match self {
            CefrLevel::A1 => 0,
            CefrLevel::A2 => 1,
            CefrLevel::B1 => 2,
            CefrLevel::B2 => 3,
            CefrLevel::C1 => 4,
            CefrLevel::C2 => 5,
        }
    }

    pub fn step_up(self) -> CefrLevel {
        Self::ALL[(self.rank() + 1).min(Self::ALL.len() - 1)]
    }

    pub fn step_down(self) -> CefrLevel {
        Self::ALL[self.rank().saturating_sub(1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

/// How decisively the scoring threshold for the final level was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A quiz question with the correct option kept server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub band: CefrLevel,
    pub correct_index: usize,
}

/// Client-facing view of a question; never exposes `correct_index`.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub band: CefrLevel,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        QuestionView {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
            band: q.band,
        }
    }
}

/// One recorded answer within an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub band: CefrLevel,
    pub option_index: usize,
    pub correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Live placement attempt state. Stored in Redis as a `{body, version}`
/// hash; `version` drives the compare-and-set on every mutation. Immutable
/// once `completed` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementAttempt {
    pub id: String,
    pub learner_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Questions asked so far, in order. The last entry is the open one.
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerRecord>,
    /// Current target difficulty for the next question.
    pub band: CefrLevel,
    /// Consecutive correct answers since the last band change.
    pub streak: u32,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: String,
    pub question: QuestionView,
    pub question_number: usize,
    pub total_questions: usize,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub option_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitAnswerResponse {
    NextQuestion {
        question: QuestionView,
        question_number: usize,
        total_questions: usize,
    },
    Completed {
        level: CefrLevel,
        confidence: Confidence,
        correct_answers: u32,
        total_questions: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_steps_clamp_at_scale_edges() {
        assert_eq!(CefrLevel::C2.step_up(), CefrLevel::C2);
        assert_eq!(CefrLevel::A1.step_down(), CefrLevel::A1);
        assert_eq!(CefrLevel::B1.step_up(), CefrLevel::B2);
        assert_eq!(CefrLevel::B1.step_down(), CefrLevel::A2);
    }

    #[test]
    fn bands_are_ordered() {
        for pair in CefrLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn question_view_hides_correct_index() {
        let q = Question {
            id: "q1".to_string(),
            text: "Pick one".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            band: CefrLevel::B1,
            correct_index: 2,
        };
        let view = QuestionView::from(&q);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_index").is_none());
        assert_eq!(json["band"], "B1");
    }
}
