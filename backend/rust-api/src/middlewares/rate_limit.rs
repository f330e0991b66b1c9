use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::services::AppState;

const DEFAULT_LEARNER_LIMIT: u32 = 60; // per minute
const DEFAULT_IP_LIMIT: u32 = 120; // per minute
const WINDOW_SECONDS: u64 = 60;

// INCR first, set the expiry only on the first hit in the window. The whole
// check runs inside Redis so two concurrent requests cannot both slip under
// the limit.
const WINDOW_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
if hits == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
if hits > tonumber(ARGV[1]) then
  return 0
end
return 1
"#;

fn limit_from_env(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            if let Some(ip) = value.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fixed-window rate limit on the placement routes, keyed per learner when
/// the auth layer ran first and per client IP always.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1" {
        return Ok(next.run(request).await);
    }

    if let Some(claims) = request.extensions().get::<super::auth::JwtClaims>() {
        let limit = limit_from_env("RATE_LIMIT_PER_USER", DEFAULT_LEARNER_LIMIT);
        let key = format!("ratelimit:learner:{}", claims.sub);
        if !within_limit(&state.redis, &key, limit).await? {
            tracing::warn!("Rate limit exceeded for learner {}", claims.sub);
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    let ip = client_ip(&request);
    let limit = limit_from_env("RATE_LIMIT_PER_IP", DEFAULT_IP_LIMIT);
    if !within_limit(&state.redis, &format!("ratelimit:ip:{}", ip), limit).await? {
        tracing::warn!("Rate limit exceeded for IP {}", ip);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}

async fn within_limit(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
) -> Result<bool, StatusCode> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(WINDOW_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(WINDOW_SECONDS)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| {
            tracing::error!("Rate limit check failed for {}: {}", key, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(allowed == 1)
}
