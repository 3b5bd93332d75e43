//! Error types for the Readlog system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadlogError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness constraint was violated. `field` names the column
    /// (e.g. `email`) and `value` the rejected input.
    #[error("Entity already exists: {entity} with {field} '{value}'")]
    AlreadyExists {
        entity: String,
        field: String,
        value: String,
    },

    #[error("Validation error: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ReadlogResult<T> = Result<T, ReadlogError>;
