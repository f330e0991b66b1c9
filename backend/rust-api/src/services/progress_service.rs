use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use thiserror::Error;

use crate::metrics::{track_db_operation, COURSE_PROGRESS_REQUESTS_TOTAL};
use crate::models::progress::{
    CourseProgress, Lesson, LessonProgressRecord, SubscriptionRecord, SubscriptionTier,
};
use crate::rules::progress::compute_course_progress;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Course not found")]
    NotFound,
    #[error("Course progress is unavailable")]
    Unavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Loads the rows the gate needs and delegates the unlock decision to the
/// pure evaluator. No writes happen on this path; identical inputs yield
/// identical output.
pub struct ProgressService {
    mongo: Database,
    free_lesson_ceiling: usize,
}

impl ProgressService {
    pub fn new(mongo: Database, free_lesson_ceiling: usize) -> Self {
        Self {
            mongo,
            free_lesson_ceiling,
        }
    }

    pub async fn course_progress(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<CourseProgress, ProgressError> {
        let lessons = match self.load_lessons(course_id).await {
            Ok(lessons) => lessons,
            Err(e) => {
                COURSE_PROGRESS_REQUESTS_TOTAL
                    .with_label_values(&["unavailable"])
                    .inc();
                tracing::error!("Failed to load lessons for course {}: {:#}", course_id, e);
                return Err(ProgressError::Unavailable);
            }
        };

        if lessons.is_empty() {
            return Err(ProgressError::NotFound);
        }

        let tier = self.load_tier(learner_id).await;

        // Fail closed: a progress fetch failure locks every lesson rather
        // than falling back to any optimistic default.
        let progress = match self.load_progress(learner_id, &lessons).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                COURSE_PROGRESS_REQUESTS_TOTAL
                    .with_label_values(&["fail_closed"])
                    .inc();
                tracing::error!(
                    "Failed to load progress for learner {} on course {}: {:#}",
                    learner_id,
                    course_id,
                    e
                );
                None
            }
        };

        if progress.is_some() {
            COURSE_PROGRESS_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
        }

        Ok(compute_course_progress(
            &lessons,
            progress.as_deref(),
            tier,
            self.free_lesson_ceiling,
        ))
    }

    async fn load_lessons(&self, course_id: &str) -> Result<Vec<Lesson>> {
        let collection = self.mongo.collection::<Lesson>("lessons");

        track_db_operation("find", "lessons", async {
            let mut cursor = collection
                .find(doc! { "course_id": course_id })
                .sort(doc! { "order_index": 1 })
                .await
                .context("Failed to query lessons")?;

            let mut lessons = Vec::new();
            while let Some(lesson) = cursor.try_next().await.context("Lesson cursor error")? {
                lessons.push(lesson);
            }
            Ok(lessons)
        })
        .await
    }

    /// A missing or unreadable subscription row degrades to Free, the most
    /// restrictive tier.
    async fn load_tier(&self, learner_id: &str) -> SubscriptionTier {
        let collection = self.mongo.collection::<SubscriptionRecord>("subscriptions");

        let row = retry_async_with_config(RetryConfig::default(), || async {
            collection
                .find_one(doc! { "learner_id": learner_id })
                .await
        })
        .await;

        match row {
            Ok(Some(record)) => record.tier,
            Ok(None) => SubscriptionTier::Free,
            Err(e) => {
                tracing::warn!(
                    "Failed to load subscription for learner {}, treating as free: {:#?}",
                    learner_id,
                    e
                );
                SubscriptionTier::Free
            }
        }
    }

    async fn load_progress(
        &self,
        learner_id: &str,
        lessons: &[Lesson],
    ) -> Result<Vec<LessonProgressRecord>> {
        let lesson_ids: Vec<&str> = lessons.iter().map(|lesson| lesson.id.as_str()).collect();
        let collection = self
            .mongo
            .collection::<LessonProgressRecord>("lesson_progress");

        track_db_operation("find", "lesson_progress", async {
            let mut cursor = collection
                .find(doc! {
                    "learner_id": learner_id,
                    "lesson_id": { "$in": lesson_ids },
                })
                .await
                .context("Failed to query lesson progress")?;

            let mut rows = Vec::new();
            while let Some(row) = cursor.try_next().await.context("Progress cursor error")? {
                rows.push(row);
            }
            Ok(rows)
        })
        .await
    }
}
