use std::time::Duration;

use axum::http::{HeaderMap, header};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, get_current_timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{error::ServiceError, state::AppState, state::connections::UserProfile};

/// Reasons a connection attempt is refused before any room operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Neither the header nor the query carried a token.
    #[error("missing authentication token")]
    MissingToken,
    /// The token did not verify.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims understood by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier; older tokens carry it as `id`.
    #[serde(alias = "id")]
    pub sub: String,
    /// Expiration as a Unix timestamp.
    pub exp: u64,
}

/// Identity asserted by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// User identifier.
    pub user_id: String,
}

/// Checks bearer tokens presented by clients.
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the identity it asserts.
    fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// HS256 JWT verifier.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier using the shared `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }
        Ok(VerifiedIdentity {
            user_id: data.claims.sub,
        })
    }
}

/// Sign an HS256 token for `user_id`, valid for `ttl`.
pub fn sign_token(
    secret: &str,
    user_id: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_owned(),
        exp: get_current_timestamp() + ttl.as_secs(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Pull the token from `Authorization: Bearer` or, failing that, the `token` query parameter.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AuthError> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    from_header
        .or_else(|| query_token.map(str::trim).filter(|token| !token.is_empty()))
        .map(str::to_owned)
        .ok_or(AuthError::MissingToken)
}

/// Verify `token` and resolve the profile it belongs to.
pub async fn authenticate(state: &AppState, token: &str) -> Result<UserProfile, ServiceError> {
    let identity = state.verifier().verify(token)?;
    let store = state.arena_store().await.ok_or(ServiceError::Degraded)?;
    let profile = store
        .find_profile(identity.user_id.clone())
        .await?
        .ok_or_else(|| {
            debug!(user = %identity.user_id, "token subject has no profile");
            ServiceError::Unauthorized(format!("unknown user {}", identity.user_id))
        })?;
    Ok(profile.into())
}
