//! SurrealDB implementation of [`RefreshTokenRepository`].
//!
//! Tokens are revoked in place, never deleted. Revocation is a
//! conditional `UPDATE ... WHERE revoked = false`, so the record's
//! revoked flag is the serialization point between concurrent callers.

use chrono::{DateTime, Utc};
use readlog_core::error::ReadlogResult;
use readlog_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use readlog_core::repository::RefreshTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbError;

/// Attempts at committing a rotation that keeps hitting write conflicts.
const MAX_ROTATE_ATTEMPTS: usize = 5;

/// Claims the old token only while it is still Active and creates the
/// replacement only if the claim matched. Whether the replacement
/// record exists afterwards is the outcome.
const ROTATE_QUERY: &str = "\
BEGIN TRANSACTION;
LET $claimed = (UPDATE type::record('refresh_token', $old_id) SET \
    revoked = true, revoked_at = time::now() \
    WHERE revoked = false AND expires_at > time::now());
IF array::len($claimed) > 0 {
    CREATE type::record('refresh_token', $new_id) SET \
        user_id = $user_id, \
        token_hash = $token_hash, \
        expires_at = $expires_at, \
        revoked = false, \
        revoked_at = NONE;
};
COMMIT TRANSACTION;";

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    user_id: String,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct RefreshTokenRowWithId {
    record_id: String,
    user_id: String,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

impl RefreshTokenRow {
    fn try_into_token(self, id: Uuid) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id,
            user_id: parse_uuid(&self.user_id, "user")?,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked: self.revoked,
            revoked_at: self.revoked_at,
        })
    }
}

impl RefreshTokenRowWithId {
    fn try_into_token(self) -> Result<RefreshToken, DbError> {
        Ok(RefreshToken {
            id: parse_uuid(&self.record_id, "refresh token")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            token_hash: self.token_hash,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked: self.revoked,
            revoked_at: self.revoked_at,
        })
    }
}

/// Commit failures caused by a concurrent writer; the transaction
/// can be run again.
fn is_write_conflict(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("conflict") || message.contains("can be retried")
}

/// A cancelled transaction reports "not executed" on every statement;
/// prefer the statement that actually failed.
fn root_cause(mut errors: Vec<(usize, surrealdb::Error)>) -> Option<surrealdb::Error> {
    errors.sort_by_key(|(index, _)| *index);
    let position = errors
        .iter()
        .position(|(_, e)| !e.to_string().contains("not executed"))
        .unwrap_or(0);
    (!errors.is_empty()).then(|| errors.swap_remove(position).1)
}

/// SurrealDB implementation of the RefreshToken repository.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<RefreshToken, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('refresh_token', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<RefreshTokenRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;

        row.try_into_token(id)
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn create(&self, input: CreateRefreshToken) -> ReadlogResult<RefreshToken> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 user_id = $user_id, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at, \
                 revoked = false, \
                 revoked_at = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: id_str,
        })?;

        Ok(row.try_into_token(id)?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> ReadlogResult<RefreshToken> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRowWithId> = result.take(0).map_err(DbError::from)?;
        // The hash is looked up, never echoed: keep it out of the error.
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: "token_hash=<redacted>".into(),
        })?;

        Ok(row.try_into_token()?)
    }

    async fn revoke(&self, id: Uuid) -> ReadlogResult<bool> {
        let result = self
            .db
            .query(
                "UPDATE type::record('refresh_token', $id) SET \
                 revoked = true, revoked_at = time::now() \
                 WHERE revoked = false",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn rotate(
        &self,
        id: Uuid,
        replacement: CreateRefreshToken,
    ) -> ReadlogResult<Option<RefreshToken>> {
        let new_id = Uuid::new_v4();
        let old_id = id.to_string();
        let new_id_str = new_id.to_string();
        let user_id = replacement.user_id.to_string();

        let mut attempt = 1;
        loop {
            let outcome = self
                .db
                .query(ROTATE_QUERY)
                .bind(("old_id", old_id.clone()))
                .bind(("new_id", new_id_str.clone()))
                .bind(("user_id", user_id.clone()))
                .bind(("token_hash", replacement.token_hash.clone()))
                .bind(("expires_at", replacement.expires_at))
                .await;

            let errors: Vec<_> = match outcome {
                Ok(mut response) => response.take_errors().into_iter().collect(),
                Err(e) => vec![(0, e)],
            };
            if errors.is_empty() {
                break;
            }
            let conflicted = errors
                .iter()
                .any(|(_, e)| is_write_conflict(&e.to_string()));
            if conflicted && attempt < MAX_ROTATE_ATTEMPTS {
                debug!(token_id = %id, attempt, "Rotation conflicted, retrying");
                attempt += 1;
                continue;
            }
            return match root_cause(errors) {
                Some(e) => Err(DbError::from(e).into()),
                None => Ok(None),
            };
        }

        match self.get_by_id(new_id).await {
            Ok(token) => Ok(Some(token)),
            Err(DbError::NotFound { .. }) => {
                warn!(token_id = %id, "Refresh token rotation rejected");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_active_by_user(&self, user_id: Uuid) -> ReadlogResult<Vec<RefreshToken>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE user_id = $user_id AND revoked = false \
                 AND expires_at > time::now() \
                 ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRowWithId> = result.take(0).map_err(DbError::from)?;
        let tokens = rows
            .into_iter()
            .map(RefreshTokenRowWithId::try_into_token)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(tokens)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> ReadlogResult<u64> {
        let result = self
            .db
            .query(
                "UPDATE refresh_token SET \
                 revoked = true, revoked_at = time::now() \
                 WHERE user_id = $user_id AND revoked = false",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
