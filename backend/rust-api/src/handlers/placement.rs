use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::placement::SubmitAnswerRequest,
    services::{
        placement_service::{PlacementError, PlacementService},
        AppState,
    },
};

pub async fn start_placement(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, PlacementApiError> {
    tracing::info!("Starting placement attempt for learner {}", claims.sub);

    let service = PlacementService::new(state.mongo.clone(), state.redis.clone(), &state.config);
    let response = service.start_attempt(&claims.sub).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, PlacementApiError> {
    tracing::info!(
        "Answer submission on attempt {} by learner {}",
        attempt_id,
        claims.sub
    );

    let service = PlacementService::new(state.mongo.clone(), state.redis.clone(), &state.config);
    let response = service
        .submit_answer(&attempt_id, &claims.sub, req.option_index)
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Boundary translation of the placement error taxonomy into HTTP.
#[derive(Debug)]
pub struct PlacementApiError(PlacementError);

impl From<PlacementError> for PlacementApiError {
    fn from(err: PlacementError) -> Self {
        PlacementApiError(err)
    }
}

impl IntoResponse for PlacementApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PlacementError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            PlacementError::InvalidState => (StatusCode::CONFLICT, self.0.to_string()),
            PlacementError::AttemptExpired => (StatusCode::GONE, self.0.to_string()),
            PlacementError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PlacementError::Internal(e) => {
                tracing::error!("Placement request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}
