use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use mongodb::bson::{doc, Bson};
use mongodb::Database;
use redis::aio::ConnectionManager;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::metrics::{
    track_cache_operation, PLACEMENT_ANSWERS_TOTAL, PLACEMENT_ATTEMPTS_TOTAL,
    PLACEMENT_LEVELS_TOTAL, RESULT_EMAILS_TOTAL,
};
use crate::models::placement::{
    AnswerRecord, PlacementAttempt, QuestionView, StartAttemptResponse, SubmitAnswerResponse,
};
use crate::models::LearnerProfile;
use crate::rules::placement::{
    advance_band, estimate_level, PlacementResult, FIRST_BAND, TOTAL_QUESTIONS,
};
use crate::services::email_service::{EmailService, EmailTemplate};
use crate::services::question_service::QuestionService;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::chrono_to_bson;

/// Logical attempt lifetime. Submissions after this window fail with
/// [`PlacementError::AttemptExpired`].
pub const ATTEMPT_TTL_SECONDS: i64 = 30 * 60;

/// Redis keeps the hash around past the logical expiry so a late submission
/// is distinguishable from an unknown attempt id.
const REDIS_KEY_TTL_SECONDS: i64 = ATTEMPT_TTL_SECONDS * 2;

const CAS_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'version')
if current == ARGV[1] then
  redis.call('HSET', KEYS[1], 'body', ARGV[2], 'version', ARGV[3])
  return 1
end
return 0
"#;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("Placement attempt not found")]
    NotFound,
    #[error("Placement attempt is not accepting answers")]
    InvalidState,
    #[error("Placement attempt has expired")]
    AttemptExpired,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct PlacementService {
    mongo: Database,
    redis: ConnectionManager,
    questions: QuestionService,
    email: Option<EmailService>,
}

impl PlacementService {
    pub fn new(mongo: Database, redis: ConnectionManager, config: &Config) -> Self {
        let questions = QuestionService::new(mongo.clone(), config.generator_api_url.clone());
        let email = config.smtp.clone().map(EmailService::new);
        Self {
            mongo,
            redis,
            questions,
            email,
        }
    }

    pub async fn start_attempt(
        &self,
        learner_id: &str,
    ) -> Result<StartAttemptResponse, PlacementError> {
        let attempt_id = Uuid::new_v4().to_string();
        let first_question = self.questions.next_question(FIRST_BAND, learner_id).await?;

        let now = Utc::now();
        let attempt = PlacementAttempt {
            id: attempt_id.clone(),
            learner_id: learner_id.to_string(),
            started_at: now,
            expires_at: now + chrono::Duration::seconds(ATTEMPT_TTL_SECONDS),
            questions: vec![first_question.clone()],
            answers: Vec::new(),
            band: FIRST_BAND,
            streak: 0,
            completed: false,
        };

        self.create_attempt(&attempt).await?;

        PLACEMENT_ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!("Placement attempt {} started for learner {}", attempt_id, learner_id);

        Ok(StartAttemptResponse {
            attempt_id,
            question: QuestionView::from(&first_question),
            question_number: 1,
            total_questions: TOTAL_QUESTIONS,
            expires_at: attempt.expires_at,
        })
    }

    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        learner_id: &str,
        option_index: usize,
    ) -> Result<SubmitAnswerResponse, PlacementError> {
        let (mut attempt, version) = self.load_attempt(attempt_id).await?;

        if let Err(e) = ensure_accepting(&attempt, learner_id, Utc::now()) {
            if matches!(e, PlacementError::AttemptExpired) {
                PLACEMENT_ATTEMPTS_TOTAL.with_label_values(&["expired"]).inc();
            }
            return Err(e);
        }

        let question = attempt
            .questions
            .last()
            .ok_or_else(|| anyhow!("Attempt {} has no open question", attempt_id))?
            .clone();

        if option_index >= question.options.len() {
            return Err(PlacementError::Validation(format!(
                "option_index must be within [0, {})",
                question.options.len()
            )));
        }

        let correct = option_index == question.correct_index;
        attempt.answers.push(AnswerRecord {
            question_id: question.id.clone(),
            band: question.band,
            option_index,
            correct,
            answered_at: Utc::now(),
        });

        PLACEMENT_ANSWERS_TOTAL
            .with_label_values(&[if correct { "true" } else { "false" }])
            .inc();

        if attempt.answers.len() >= TOTAL_QUESTIONS {
            attempt.completed = true;
            let result = estimate_level(&attempt.answers);

            self.store_attempt(&attempt, version).await?;
            self.finalize_attempt(&attempt, &result).await;

            PLACEMENT_ATTEMPTS_TOTAL
                .with_label_values(&["completed"])
                .inc();
            PLACEMENT_LEVELS_TOTAL
                .with_label_values(&[result.level.as_str()])
                .inc();

            return Ok(SubmitAnswerResponse::Completed {
                level: result.level,
                confidence: result.confidence,
                correct_answers: result.correct_answers,
                total_questions: TOTAL_QUESTIONS,
            });
        }

        let (next_band, next_streak) = advance_band(attempt.band, attempt.streak, correct);
        attempt.band = next_band;
        attempt.streak = next_streak;

        let next_question = self
            .questions
            .next_question(next_band, learner_id)
            .await?;
        attempt.questions.push(next_question.clone());

        self.store_attempt(&attempt, version).await?;

        Ok(SubmitAnswerResponse::NextQuestion {
            question: QuestionView::from(&next_question),
            question_number: attempt.answers.len() + 1,
            total_questions: TOTAL_QUESTIONS,
        })
    }

    async fn create_attempt(&self, attempt: &PlacementAttempt) -> Result<(), PlacementError> {
        let key = attempt_key(&attempt.id);
        let body = serde_json::to_string(attempt)
            .context("Failed to serialize placement attempt")?;
        let mut conn = self.redis.clone();

        track_cache_operation("hset", async {
            redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(&key)
                .arg("body")
                .arg(&body)
                .arg("version")
                .arg(1)
                .ignore()
                .cmd("EXPIRE")
                .arg(&key)
                .arg(REDIS_KEY_TTL_SECONDS)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to save placement attempt to Redis")
        })
        .await?;

        Ok(())
    }

    async fn load_attempt(
        &self,
        attempt_id: &str,
    ) -> Result<(PlacementAttempt, u64), PlacementError> {
        let key = attempt_key(attempt_id);

        let (body, version): (Option<String>, Option<u64>) =
            retry_async_with_config(RetryConfig::default(), || async {
                let mut conn = self.redis.clone();
                redis::cmd("HMGET")
                    .arg(&key)
                    .arg("body")
                    .arg("version")
                    .query_async(&mut conn)
                    .await
            })
            .await
            .context("Failed to load placement attempt from Redis")?;

        let (Some(body), Some(version)) = (body, version) else {
            return Err(PlacementError::NotFound);
        };

        let attempt: PlacementAttempt = serde_json::from_str(&body)
            .context("Failed to deserialize placement attempt")?;

        Ok((attempt, version))
    }

    /// Write the attempt back only if nobody else advanced it in between.
    /// A duplicate network retry racing on the same attempt loses the CAS
    /// and is rejected instead of double-advancing the question sequence.
    async fn store_attempt(
        &self,
        attempt: &PlacementAttempt,
        expected_version: u64,
    ) -> Result<(), PlacementError> {
        let key = attempt_key(&attempt.id);
        let body = serde_json::to_string(attempt)
            .context("Failed to serialize placement attempt")?;
        let mut conn = self.redis.clone();

        let script = redis::Script::new(CAS_SCRIPT);
        let applied: i64 = track_cache_operation("eval", async {
            script
                .key(&key)
                .arg(expected_version.to_string())
                .arg(&body)
                .arg((expected_version + 1).to_string())
                .invoke_async(&mut conn)
                .await
                .context("Failed to update placement attempt in Redis")
        })
        .await?;

        if applied == 0 {
            tracing::warn!(
                "Lost attempt-state race on {}, rejecting duplicate submission",
                attempt.id
            );
            return Err(PlacementError::InvalidState);
        }

        Ok(())
    }

    /// Completion side effects: archive the attempt, write the learner's
    /// level once, and send the result email. None of these may fail the
    /// quiz-completion response.
    async fn finalize_attempt(
        &self,
        attempt: &PlacementAttempt,
        result: &PlacementResult,
    ) {
        self.archive_attempt(attempt);

        let profile = match self.persist_level(attempt, result).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!(
                    "Failed to persist computed level for learner {}: {:#}",
                    attempt.learner_id,
                    e
                );
                None
            }
        };

        if let Some(profile) = profile {
            self.send_result_email(profile, result);
        }
    }

    fn archive_attempt(&self, attempt: &PlacementAttempt) {
        let mongo = self.mongo.clone();
        let attempt = attempt.clone();

        tokio::spawn(async move {
            let collection = mongo.collection::<PlacementAttempt>("placement_attempts");
            let res = retry_async_with_config(RetryConfig::aggressive(), || async {
                collection.insert_one(&attempt).await.map(|_| ())
            })
            .await;

            match res {
                Ok(()) => tracing::info!("Archived placement attempt {}", attempt.id),
                Err(e) => tracing::error!("Failed to archive placement attempt: {:#?}", e),
            }
        });
    }

    /// First result wins: the update is filtered on `computed_level` being
    /// unset, so a learner who retakes the quiz keeps their original level.
    async fn persist_level(
        &self,
        attempt: &PlacementAttempt,
        result: &PlacementResult,
    ) -> Result<Option<LearnerProfile>> {
        let learners = self.mongo.collection::<LearnerProfile>("learners");

        let update = retry_async_with_config(RetryConfig::aggressive(), || async {
            learners
                .update_one(
                    doc! { "_id": &attempt.learner_id, "computed_level": Bson::Null },
                    doc! { "$set": {
                        "computed_level": result.level.as_str(),
                        "level_computed_at": chrono_to_bson(Utc::now()),
                    }},
                )
                .await
        })
        .await
        .context("Failed to persist computed level")?;

        if update.modified_count == 0 {
            tracing::info!(
                "Learner {} already has a computed level, keeping first result",
                attempt.learner_id
            );
        }

        let profile = retry_async_with_config(RetryConfig::default(), || async {
            learners.find_one(doc! { "_id": &attempt.learner_id }).await
        })
        .await
        .context("Failed to load learner profile")?;

        Ok(profile)
    }

    fn send_result_email(
        &self,
        profile: LearnerProfile,
        result: &PlacementResult,
    ) {
        let Some(email) = &self.email else {
            tracing::debug!("SMTP not configured, skipping placement result email");
            return;
        };

        let mut params = HashMap::new();
        params.insert("name".to_string(), profile.display_name.clone());
        params.insert("level".to_string(), result.level.as_str().to_string());
        params.insert(
            "confidence".to_string(),
            format!("{:?}", result.confidence).to_lowercase(),
        );
        params.insert("correct".to_string(), result.correct_answers.to_string());
        params.insert("total".to_string(), TOTAL_QUESTIONS.to_string());

        let email = email.clone();
        tokio::spawn(async move {
            let sent = email
                .send_template(
                    EmailTemplate::PlacementResult,
                    &profile.email,
                    &profile.display_name,
                    &params,
                )
                .await;

            match sent {
                Ok(()) => {
                    RESULT_EMAILS_TOTAL.with_label_values(&["sent"]).inc();
                    tracing::info!("Placement result email sent to learner {}", profile.id);
                }
                Err(e) => {
                    RESULT_EMAILS_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::error!(
                        "Failed to send placement result email to learner {}: {:#}",
                        profile.id,
                        e
                    );
                }
            }
        });
    }
}

fn attempt_key(attempt_id: &str) -> String {
    format!("placement:attempt:{}", attempt_id)
}

/// Whether an attempt may accept another answer. Attempt handles are
/// learner-scoped, so a foreign id reads as unknown rather than forbidden;
/// a completed attempt is immutable and a ninth submission lands here.
pub fn ensure_accepting(
    attempt: &PlacementAttempt,
    learner_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<(), PlacementError> {
    if attempt.learner_id != learner_id {
        return Err(PlacementError::NotFound);
    }
    if attempt.completed {
        return Err(PlacementError::InvalidState);
    }
    if now > attempt.expires_at {
        return Err(PlacementError::AttemptExpired);
    }
    Ok(())
}
