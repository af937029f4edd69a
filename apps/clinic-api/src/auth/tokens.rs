//! Admin bearer token issue/verify (HS256).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;

/// Admin token lifetime in seconds (24 hours).
pub const TOKEN_TTL_SECS: i64 = 24 * 3600;

/// Claims carried by an admin bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed admin token for the given email.
pub fn issue(config: &Config, email: &str) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = AdminClaims {
        sub: "admin".to_string(),
        email: email.to_string(),
        role: "admin".to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|err| {
        tracing::error!(?err, "failed to sign admin token");
        ApiError::internal("Failed to issue token")
    })
}

/// Verify a bearer token and return its claims. Expiry is enforced.
pub fn verify(config: &Config, token: &str) -> Result<AdminClaims, ApiError> {
    let data = jsonwebtoken::decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    Ok(data.claims)
}
