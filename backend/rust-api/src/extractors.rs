use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// JSON extractor that turns malformed bodies into a structured 400 instead
/// of axum's plain-text default.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::warn!("Rejected request body: {}", rejection);
            let body = json!({
                "message": format!("Failed to parse JSON request body: {}", rejection),
                "status": 400,
            });
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        })?;

        Ok(AppJson(value))
    }
}
