use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::services::AppState;

pub mod placement;
pub mod progress;

#[derive(Serialize)]
struct DependencyHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DependencyHealth {
    fn healthy() -> Self {
        Self {
            status: "healthy",
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            error: Some(error),
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    mongodb: DependencyHealth,
    redis: DependencyHealth,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongodb = check_mongodb(&state).await;
    let redis = check_redis(&state).await;

    let all_healthy = mongodb.is_healthy() && redis.is_healthy();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        service: "linguahub-api",
        version: env!("CARGO_PKG_VERSION"),
        mongodb,
        redis,
    };

    (status_code, Json(body))
}

async fn check_mongodb(state: &AppState) -> DependencyHealth {
    let ping = state.mongo.run_command(mongodb::bson::doc! { "ping": 1 });
    match tokio::time::timeout(Duration::from_secs(1), ping).await {
        Ok(Ok(_)) => DependencyHealth::healthy(),
        Ok(Err(e)) => DependencyHealth::unhealthy(format!("MongoDB error: {}", e)),
        Err(_) => DependencyHealth::unhealthy("MongoDB timeout after 1s".to_string()),
    }
}

async fn check_redis(state: &AppState) -> DependencyHealth {
    let mut conn = state.redis.clone();
    let cmd = redis::cmd("PING");
    let ping = cmd.query_async::<String>(&mut conn);
    match tokio::time::timeout(Duration::from_millis(500), ping).await {
        Ok(Ok(_)) => DependencyHealth::healthy(),
        Ok(Err(e)) => DependencyHealth::unhealthy(format!("Redis error: {}", e)),
        Err(_) => DependencyHealth::unhealthy("Redis timeout after 500ms".to_string()),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Basic auth gate for /metrics. Credentials come from METRICS_AUTH as
/// `username:password`.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let credentials = BASE64
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
