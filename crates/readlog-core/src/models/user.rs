//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string. Never leaves the credential store boundary
    /// except for verification.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Raw password (validated against the password policy and hashed
    /// with Argon2id before storage).
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Lowercased form used for case-insensitive uniqueness and lookup.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
