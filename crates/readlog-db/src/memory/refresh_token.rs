//! In-memory implementation of [`RefreshTokenRepository`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use readlog_core::error::{ReadlogError, ReadlogResult};
use readlog_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use readlog_core::repository::RefreshTokenRepository;
use uuid::Uuid;

use super::lock;

#[derive(Default)]
struct Tokens {
    by_id: HashMap<Uuid, RefreshToken>,
    by_hash: HashMap<String, Uuid>,
}

impl Tokens {
    fn insert(&mut self, input: CreateRefreshToken, now: DateTime<Utc>) -> ReadlogResult<RefreshToken> {
        if self.by_hash.contains_key(&input.token_hash) {
            return Err(ReadlogError::AlreadyExists {
                entity: "refresh_token".into(),
                field: "token_hash".into(),
                value: "<redacted>".into(),
            });
        }
        let token = RefreshToken {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            token_hash: input.token_hash,
            created_at: now,
            expires_at: input.expires_at,
            revoked: false,
            revoked_at: None,
        };
        self.by_hash.insert(token.token_hash.clone(), token.id);
        self.by_id.insert(token.id, token.clone());
        Ok(token)
    }
}

#[derive(Clone, Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: Arc<Mutex<Tokens>>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored token, revoked and expired ones included.
    pub fn all(&self) -> ReadlogResult<Vec<RefreshToken>> {
        let tokens = lock(&self.tokens)?;
        Ok(tokens.by_id.values().cloned().collect())
    }
}

impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn create(&self, input: CreateRefreshToken) -> ReadlogResult<RefreshToken> {
        lock(&self.tokens)?.insert(input, Utc::now())
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> ReadlogResult<RefreshToken> {
        let tokens = lock(&self.tokens)?;
        tokens
            .by_hash
            .get(token_hash)
            .and_then(|id| tokens.by_id.get(id))
            .cloned()
            .ok_or_else(|| ReadlogError::NotFound {
                entity: "refresh_token".into(),
                id: "token_hash=<redacted>".into(),
            })
    }

    async fn revoke(&self, id: Uuid) -> ReadlogResult<bool> {
        let mut tokens = lock(&self.tokens)?;
        match tokens.by_id.get_mut(&id) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                token.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate(
        &self,
        id: Uuid,
        replacement: CreateRefreshToken,
    ) -> ReadlogResult<Option<RefreshToken>> {
        let now = Utc::now();
        let mut tokens = lock(&self.tokens)?;

        match tokens.by_id.get(&id) {
            Some(token) if token.is_active_at(now) => {}
            _ => return Ok(None),
        }
        // Insert first: if it fails the source token is untouched.
        let created = tokens.insert(replacement, now)?;
        if let Some(token) = tokens.by_id.get_mut(&id) {
            token.revoked = true;
            token.revoked_at = Some(now);
        }
        Ok(Some(created))
    }

    async fn list_active_by_user(&self, user_id: Uuid) -> ReadlogResult<Vec<RefreshToken>> {
        let now = Utc::now();
        let tokens = lock(&self.tokens)?;
        let mut active: Vec<RefreshToken> = tokens
            .by_id
            .values()
            .filter(|t| t.user_id == user_id && t.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by_key(|t| t.created_at);
        Ok(active)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> ReadlogResult<u64> {
        let now = Utc::now();
        let mut tokens = lock(&self.tokens)?;
        let mut count = 0;
        for token in tokens
            .by_id
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            token.revoked_at = Some(now);
            count += 1;
        }
        Ok(count)
    }
}
