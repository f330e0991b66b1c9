use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::services::AppState;

/// Claims minted by the session subsystem. `sub` is the opaque learner id
/// that every service takes as an explicit parameter.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Invalid token")]
    InvalidToken,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

/// Validates the Bearer token and injects [`JwtClaims`] for handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = JwtService::new(&state.config.jwt_secret)
        .validate_token(token)
        .map_err(|e| {
            tracing::warn!("JWT validation failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

    tracing::debug!("Authenticated learner {} (role {})", claims.sub, claims.role);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> JwtClaims {
        JwtClaims {
            sub: "learner-42".to_string(),
            role: "learner".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iat: chrono::Utc::now().timestamp() as usize,
        }
    }

    #[test]
    fn jwt_round_trip_preserves_claims() {
        let service = JwtService::new("test-secret");

        let token = service.generate_token(&claims()).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, "learner-42");
        assert_eq!(validated.role, "learner");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let service = JwtService::new("test-secret");
        let other = JwtService::new("other-secret");

        let token = other.generate_token(&claims()).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new("test-secret");

        let mut expired = claims();
        expired.exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        expired.iat = expired.exp - 60;

        let token = service.generate_token(&expired).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }
}
