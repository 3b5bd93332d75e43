//! Database-specific error types and conversions.

use readlog_core::error::ReadlogError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Password hashing error: {0}")]
    Hash(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<DbError> for ReadlogError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ReadlogError::NotFound { entity, id },
            DbError::Hash(msg) => ReadlogError::Crypto(msg),
            DbError::Poisoned => ReadlogError::Internal(err.to_string()),
            other => ReadlogError::Database(other.to_string()),
        }
    }
}
