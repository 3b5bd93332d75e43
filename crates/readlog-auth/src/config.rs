//! Authentication configuration.

use std::env;
use std::str::FromStr;

use chrono::Duration;

use crate::error::AuthError;

/// HS256 keys shorter than the hash output weaken the MAC.
pub const MIN_SECRET_BYTES: usize = 32;

/// Configuration for the authentication service. Built once at
/// startup and passed by value; never read from globals.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared secret for HS256 signing and verification.
    pub jwt_secret: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim).
    pub jwt_audience: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_lifetime_minutes: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_lifetime_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "readlog".into(),
            jwt_audience: "readlog-api".into(),
            access_token_lifetime_minutes: 15,
            refresh_token_lifetime_days: 7,
        }
    }
}

impl AuthConfig {
    /// Load from `READLOG_JWT_SECRET` (required), `READLOG_JWT_ISSUER`,
    /// `READLOG_JWT_AUDIENCE`, `READLOG_ACCESS_TOKEN_MINUTES` and
    /// `READLOG_REFRESH_TOKEN_DAYS`. The result is validated.
    pub fn from_env() -> Result<Self, AuthError> {
        let defaults = Self::default();
        let config = Self {
            jwt_secret: env::var("READLOG_JWT_SECRET")
                .map_err(|_| AuthError::Configuration("READLOG_JWT_SECRET is not set".into()))?,
            jwt_issuer: env::var("READLOG_JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            jwt_audience: env::var("READLOG_JWT_AUDIENCE").unwrap_or(defaults.jwt_audience),
            access_token_lifetime_minutes: parse_var(
                "READLOG_ACCESS_TOKEN_MINUTES",
                defaults.access_token_lifetime_minutes,
            )?,
            refresh_token_lifetime_days: parse_var(
                "READLOG_REFRESH_TOKEN_DAYS",
                defaults.refresh_token_lifetime_days,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Configuration(format!(
                "JWT secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        if self.jwt_issuer.trim().is_empty() || self.jwt_audience.trim().is_empty() {
            return Err(AuthError::Configuration(
                "JWT issuer and audience must not be empty".into(),
            ));
        }
        if self.access_token_lifetime_minutes <= 0 || self.refresh_token_lifetime_days <= 0 {
            return Err(AuthError::Configuration(
                "token lifetimes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn access_token_lifetime(&self) -> Duration {
        Duration::minutes(self.access_token_lifetime_minutes)
    }

    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::days(self.refresh_token_lifetime_days)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AuthError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Configuration(format!("{name} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}
