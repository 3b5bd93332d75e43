//! Authentication error types.

use readlog_core::error::ReadlogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<AuthError> for ReadlogError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => {
                ReadlogError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            AuthError::Crypto(msg) => ReadlogError::Crypto(msg),
            AuthError::Configuration(msg) => ReadlogError::Configuration(msg),
        }
    }
}
