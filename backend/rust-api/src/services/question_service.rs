use anyhow::{anyhow, Context, Result};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use rand::prelude::IndexedRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::placement::{CefrLevel, Question};

/// Number of answer options every placement question carries.
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Serialize)]
struct GenerateQuestionRequest {
    band: CefrLevel,
    learner_id: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    text: String,
    options: Vec<String>,
    correct_index: usize,
}

#[derive(Debug, Deserialize)]
struct QuestionDocument {
    #[serde(rename = "_id")]
    id: mongodb::bson::oid::ObjectId,
    text: String,
    options: Vec<String>,
    band: CefrLevel,
    correct_index: usize,
}

/// Supplies one question per quiz step at a target difficulty band.
///
/// The external generator is tried first; any failure falls back to a
/// random pick from the curated Mongo bank so the quiz never stalls on a
/// generator outage.
pub struct QuestionService {
    mongo: Database,
    http_client: Client,
    generator_api_url: String,
}

impl QuestionService {
    pub fn new(mongo: Database, generator_api_url: String) -> Self {
        Self {
            mongo,
            http_client: Client::new(),
            generator_api_url,
        }
    }

    pub async fn next_question(&self, band: CefrLevel, learner_id: &str) -> Result<Question> {
        match self.generate_question(band, learner_id).await {
            Ok(question) => {
                tracing::info!("Generated question via generator API for band {}", band.as_str());
                Ok(question)
            }
            Err(e) => {
                tracing::warn!(
                    "Question generator failed ({}), falling back to bank for band {}",
                    e,
                    band.as_str()
                );
                self.pick_from_bank(band).await
            }
        }
    }

    async fn generate_question(&self, band: CefrLevel, learner_id: &str) -> Result<Question> {
        let url = format!("{}/internal/generate_question", self.generator_api_url);

        let payload = GenerateQuestionRequest {
            band,
            learner_id: learner_id.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .context("Failed to call question generator API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Question generator returned error {}: {}",
                status,
                error_text
            ));
        }

        let generated: GeneratedQuestion = response
            .json()
            .await
            .context("Failed to parse question generator response")?;

        if generated.options.len() != OPTIONS_PER_QUESTION {
            return Err(anyhow!(
                "Generated question has {} options, expected {}",
                generated.options.len(),
                OPTIONS_PER_QUESTION
            ));
        }
        if generated.correct_index >= generated.options.len() {
            return Err(anyhow!("Generated question has out-of-range correct_index"));
        }

        Ok(Question {
            id: Uuid::new_v4().to_string(),
            text: generated.text,
            options: generated.options,
            band,
            correct_index: generated.correct_index,
        })
    }

    async fn pick_from_bank(&self, band: CefrLevel) -> Result<Question> {
        let collection = self.mongo.collection::<QuestionDocument>("questions");

        let mut cursor = collection
            .find(doc! { "band": band.as_str() })
            .await
            .context("Failed to query question bank")?;

        let mut candidates = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .context("Question bank cursor error")?
        {
            if document.options.len() == OPTIONS_PER_QUESTION
                && document.correct_index < document.options.len()
            {
                candidates.push(document);
            }
        }

        let chosen = candidates
            .choose(&mut rand::rng())
            .ok_or_else(|| anyhow!("No bank questions available for band {}", band.as_str()))?;

        Ok(Question {
            id: chosen.id.to_hex(),
            text: chosen.text.clone(),
            options: chosen.options.clone(),
            band: chosen.band,
            correct_index: chosen.correct_index,
        })
    }
}
