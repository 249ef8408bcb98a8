//! Bearer-token authentication for worker devices.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::handlers::AppState;

/// Token claims. `sub` is the worker id recorded as patient owner.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Issues and validates HS256 worker tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    secret: Arc<String>,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
        }
    }

    /// Read `JWT_SECRET`, falling back to a random per-process secret.
    pub fn from_env() -> Self {
        match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => {
                if secret.len() < 32 {
                    tracing::warn!("JWT_SECRET is shorter than 32 characters");
                }
                Self::new(secret)
            }
            _ => {
                let mut key_bytes = [0u8; 32];
                OsRng.fill_bytes(&mut key_bytes);
                tracing::warn!(
                    "JWT_SECRET is not set; using a random secret, tokens will not survive a restart"
                );
                Self::new(hex::encode(key_bytes))
            }
        }
    }

    /// Sign a token for `worker_id` that expires after `ttl`.
    pub fn issue(&self, worker_id: &str, role: &str, ttl: Duration) -> Result<String, AuthError> {
        let expires_at = (chrono::Utc::now().timestamp().max(0) as u64).saturating_add(ttl.as_secs());
        let claims = Claims {
            sub: worker_id.to_string(),
            role: role.to_string(),
            exp: usize::try_from(expires_at).unwrap_or(usize::MAX),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Issue(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }
}

/// Token from an `Authorization` value. The scheme name matches in any case.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Require `Authorization: Bearer <token>` and attach the [`Claims`] to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AuthError::MissingToken)?;

    let claims = state.tokens.validate(token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
