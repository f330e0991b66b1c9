use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    services::{
        progress_service::{ProgressError, ProgressService},
        AppState,
    },
};

pub async fn course_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ProgressApiError> {
    tracing::info!(
        "Computing course progress for learner {} on course {}",
        claims.sub,
        course_id
    );

    let service = ProgressService::new(state.mongo.clone(), state.config.free_lesson_ceiling);
    let response = service.course_progress(&claims.sub, &course_id).await?;

    Ok((StatusCode::OK, Json(response)))
}

#[derive(Debug)]
pub struct ProgressApiError(ProgressError);

impl From<ProgressError> for ProgressApiError {
    fn from(err: ProgressError) -> Self {
        ProgressApiError(err)
    }
}

impl IntoResponse for ProgressApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ProgressError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            ProgressError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            ProgressError::Internal(e) => {
                tracing::error!("Progress request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}
