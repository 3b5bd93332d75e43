//! Outcome of the public authentication operations.
//!
//! Expected failures (bad input, taken email, wrong password, dead
//! refresh token) are values of [`AuthResult`]; only faults the caller
//! cannot act on travel as `Err(ReadlogError)`.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token.";
pub const USER_NOT_FOUND: &str = "User not found.";

/// Classification of a failed operation, mirroring 400/409/401.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AuthErrorKind {
    Validation,
    Conflict,
    Unauthorized,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthFailure {
    pub kind: AuthErrorKind,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthResult {
    Success(AuthTokens),
    Failure(AuthFailure),
}

impl AuthResult {
    pub fn failure(kind: AuthErrorKind, errors: Vec<String>) -> Self {
        Self::Failure(AuthFailure { kind, errors })
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::failure(AuthErrorKind::Unauthorized, vec![message.to_string()])
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn tokens(&self) -> Option<&AuthTokens> {
        match self {
            Self::Success(tokens) => Some(tokens),
            Self::Failure(_) => None,
        }
    }

    pub fn into_tokens(self) -> Option<AuthTokens> {
        match self {
            Self::Success(tokens) => Some(tokens),
            Self::Failure(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<AuthErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::Success(_) => &[],
            Self::Failure(failure) => &failure.errors,
        }
    }
}
