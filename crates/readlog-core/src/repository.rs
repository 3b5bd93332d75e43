//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The authentication service is
//! generic over these traits so it carries no dependency on a storage
//! engine.

use uuid::Uuid;

use crate::error::ReadlogResult;
use crate::models::{
    refresh_token::{CreateRefreshToken, RefreshToken},
    user::{CreateUser, User},
};

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Create an account. Password policy and email format violations
    /// are reported together as `ReadlogError::Validation`; a taken
    /// email or username as `ReadlogError::AlreadyExists`.
    fn create(&self, input: CreateUser) -> impl Future<Output = ReadlogResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ReadlogResult<User>> + Send;
    /// Case-insensitive.
    fn get_by_email(&self, email: &str) -> impl Future<Output = ReadlogResult<User>> + Send;
    /// Case-insensitive.
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = ReadlogResult<User>> + Send;
    fn verify_password(
        &self,
        user: &User,
        password: &str,
    ) -> impl Future<Output = ReadlogResult<bool>> + Send;
    /// Idempotent.
    fn assign_role(&self, user_id: Uuid, role: &str)
    -> impl Future<Output = ReadlogResult<()>> + Send;
    /// Role names sorted ascending.
    fn get_roles(&self, user_id: Uuid) -> impl Future<Output = ReadlogResult<Vec<String>>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh token store
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = ReadlogResult<RefreshToken>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = ReadlogResult<RefreshToken>> + Send;
    /// Compare-and-set on the revoked flag. Returns `true` only for the
    /// call that moved the token out of the non-revoked state; expired
    /// tokens are still revocable.
    fn revoke(&self, id: Uuid) -> impl Future<Output = ReadlogResult<bool>> + Send;
    /// Revoke `id` and insert `replacement` as a single unit of work.
    ///
    /// The revocation only applies while the token is still Active
    /// (not revoked, not expired). If that check fails nothing is
    /// written and `Ok(None)` is returned; concurrent callers racing on
    /// the same token therefore see at most one `Some`.
    fn rotate(
        &self,
        id: Uuid,
        replacement: CreateRefreshToken,
    ) -> impl Future<Output = ReadlogResult<Option<RefreshToken>>> + Send;
    fn list_active_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = ReadlogResult<Vec<RefreshToken>>> + Send;
    /// Revoke every non-revoked token of the user; returns how many
    /// records changed.
    fn revoke_all_for_user(&self, user_id: Uuid) -> impl Future<Output = ReadlogResult<u64>> + Send;
}
