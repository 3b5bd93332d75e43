//! HS256 JWT access token issuance/verification and opaque refresh
//! token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use readlog_core::models::user::User;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{AuthConfig, MIN_SECRET_BYTES};
use crate::error::AuthError;

/// Entropy of a refresh token in bytes.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: user ID (UUID string).
    pub sub: String,
    pub email: String,
    /// Username.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Unique token ID (UUID string).
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// A freshly signed access token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn secret_bytes(config: &AuthConfig) -> Result<&[u8], AuthError> {
    let secret = config.jwt_secret.as_bytes();
    if secret.len() < MIN_SECRET_BYTES {
        return Err(AuthError::Configuration(format!(
            "JWT secret must be at least {MIN_SECRET_BYTES} bytes"
        )));
    }
    Ok(secret)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Issue a signed HS256 JWT access token for `user` carrying `roles`.
pub fn issue_access_token(
    user: &User,
    roles: &[String],
    config: &AuthConfig,
) -> Result<IssuedAccessToken, AuthError> {
    let key = EncodingKey::from_secret(secret_bytes(config)?);

    let now = Utc::now();
    let expires_at = now + config.access_token_lifetime();
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.username.clone(),
        given_name: non_blank(&user.first_name),
        family_name: non_blank(&user.last_name),
        roles: roles.to_vec(),
        jti: Uuid::new_v4().to_string(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

    Ok(IssuedAccessToken { token, expires_at })
}

/// Decode and verify an HS256 JWT access token: signature, issuer,
/// audience and expiry, with no clock leeway.
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_secret(secret_bytes(config)?);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&config.jwt_issuer]);
    validation.set_audience(&[&config.jwt_audience]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

/// Validated JWT claims, a newtype proving the token was verified.
#[derive(Debug, Clone)]
pub struct ValidatedClaims(pub AccessTokenClaims);

impl ValidatedClaims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.0.sub).map_err(|e| AuthError::TokenInvalid(format!("sub: {e}")))
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.0.roles.iter().any(|r| r == role)
    }
}

/// Validate a JWT access token and return the verified claims. Purely
/// stateless; no store lookup is performed.
pub fn validate_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<ValidatedClaims, AuthError> {
    decode_access_token(token, config).map(ValidatedClaims)
}

/// Generate a cryptographically random opaque refresh token
/// (64 bytes → base64url-encoded, no padding).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh token, hex-encoded. This is the value
/// persisted and looked up; the raw token is never stored.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
