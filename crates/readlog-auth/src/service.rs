//! Authentication service: registration, login, refresh-token
//! rotation and revocation.

use chrono::Utc;
use readlog_core::error::{ReadlogError, ReadlogResult};
use readlog_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use readlog_core::models::user::{CreateUser, User};
use readlog_core::repository::{RefreshTokenRepository, UserRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::result::{
    AuthErrorKind, AuthResult, AuthTokens, INVALID_CREDENTIALS, INVALID_REFRESH_TOKEN,
    USER_NOT_FOUND,
};
use crate::token::{self, IssuedAccessToken, ValidatedClaims};

/// Input for the registration flow.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Input for the login flow.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email_or_username: String,
    pub password: String,
}

/// A new refresh token: the raw value for the caller and the record
/// to persist.
struct PendingRefreshToken {
    raw: String,
    record: CreateRefreshToken,
}

#[derive(Debug, Clone, Copy)]
enum LoginRejection {
    UnknownIdentifier,
    PasswordMismatch,
}

impl LoginRejection {
    fn as_str(self) -> &'static str {
        match self {
            Self::UnknownIdentifier => "unknown_identifier",
            Self::PasswordMismatch => "password_mismatch",
        }
    }
}

/// One event per rejected login, whatever the cause.
fn reject_login(reason: LoginRejection) -> AuthResult {
    warn!(reason = reason.as_str(), "Login rejected");
    AuthResult::unauthorized(INVALID_CREDENTIALS)
}

fn conflict_message(field: &str, value: &str) -> String {
    let mut label = field.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("{label} '{value}' is already taken.")
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate. Holds no per-request
/// state; every operation is a self-contained unit of work against the
/// stores.
pub struct AuthService<U: UserRepository, R: RefreshTokenRepository> {
    user_repo: U,
    token_repo: R,
    config: AuthConfig,
}

impl<U: UserRepository, R: RefreshTokenRepository> AuthService<U, R> {
    /// Fails if `config` could not sign or verify tokens.
    pub fn new(user_repo: U, token_repo: R, config: AuthConfig) -> ReadlogResult<Self> {
        config.validate()?;
        Ok(Self {
            user_repo,
            token_repo,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account and open a session for it.
    pub async fn register(&self, input: RegisterInput) -> ReadlogResult<AuthResult> {
        let created = self
            .user_repo
            .create(CreateUser {
                username: input.username,
                email: input.email,
                password: input.password,
                first_name: input.first_name,
                last_name: input.last_name,
            })
            .await;

        let user = match created {
            Ok(user) => user,
            Err(ReadlogError::Validation { errors }) => {
                warn!(count = errors.len(), "Registration rejected: validation");
                return Ok(AuthResult::failure(AuthErrorKind::Validation, errors));
            }
            Err(ReadlogError::AlreadyExists { field, value, .. }) => {
                warn!(field = %field, "Registration rejected: conflict");
                return Ok(AuthResult::failure(
                    AuthErrorKind::Conflict,
                    vec![conflict_message(&field, &value)],
                ));
            }
            Err(e) => return Err(e),
        };

        let tokens = self.open_session(&user).await?;
        info!(user_id = %user.id, "User registered");
        Ok(AuthResult::Success(tokens))
    }

    /// Authenticate with email or username + password.
    ///
    /// The identifier is tried as an email first, then as a username.
    /// Unknown identifiers and wrong passwords produce the same
    /// failure.
    pub async fn login(&self, input: LoginInput) -> ReadlogResult<AuthResult> {
        let Some(user) = self.find_login_user(&input.email_or_username).await? else {
            return Ok(reject_login(LoginRejection::UnknownIdentifier));
        };

        if !self.user_repo.verify_password(&user, &input.password).await? {
            return Ok(reject_login(LoginRejection::PasswordMismatch));
        }

        let tokens = self.open_session(&user).await?;
        info!(user_id = %user.id, "User logged in");
        Ok(AuthResult::Success(tokens))
    }

    /// Redeem a refresh token for a new token pair.
    ///
    /// Each refresh token is single-use: the presented token is revoked
    /// and its replacement inserted in one store operation. Unknown,
    /// expired and revoked tokens fail identically.
    pub async fn refresh_token(&self, raw_refresh_token: &str) -> ReadlogResult<AuthResult> {
        let token_hash = token::hash_refresh_token(raw_refresh_token);
        let stored = match self.token_repo.get_by_token_hash(&token_hash).await {
            Ok(stored) if stored.is_active() => stored,
            Ok(stored) => {
                warn!(token_id = %stored.id, state = ?stored.state(), "Refresh rejected");
                return Ok(AuthResult::unauthorized(INVALID_REFRESH_TOKEN));
            }
            Err(ReadlogError::NotFound { .. }) => {
                warn!("Refresh rejected: unknown token");
                return Ok(AuthResult::unauthorized(INVALID_REFRESH_TOKEN));
            }
            Err(e) => return Err(e),
        };

        let user = match self.user_repo.get_by_id(stored.user_id).await {
            Ok(user) => user,
            Err(ReadlogError::NotFound { .. }) => {
                warn!(token_id = %stored.id, user_id = %stored.user_id, "Refresh rejected: user missing");
                return Ok(AuthResult::unauthorized(USER_NOT_FOUND));
            }
            Err(e) => return Err(e),
        };

        // Signing failures must leave the presented token redeemable.
        let access = self.issue_access_token(&user).await?;
        let pending = self.new_refresh_token(user.id);

        match self.token_repo.rotate(stored.id, pending.record).await? {
            Some(replacement) => {
                info!(
                    user_id = %user.id,
                    revoked_token_id = %stored.id,
                    token_id = %replacement.id,
                    "Refresh token rotated"
                );
                Ok(AuthResult::Success(AuthTokens {
                    access_token: access.token,
                    refresh_token: pending.raw,
                    access_token_expires_at: access.expires_at,
                }))
            }
            None => {
                warn!(token_id = %stored.id, "Refresh rejected: token already redeemed");
                Ok(AuthResult::unauthorized(INVALID_REFRESH_TOKEN))
            }
        }
    }

    /// Revoke a refresh token (logout). Returns `false` if the token is
    /// unknown or already revoked. Expired tokens are still revoked and
    /// recorded.
    pub async fn revoke_token(&self, raw_refresh_token: &str) -> ReadlogResult<bool> {
        let token_hash = token::hash_refresh_token(raw_refresh_token);
        let stored = match self.token_repo.get_by_token_hash(&token_hash).await {
            Ok(stored) => stored,
            Err(ReadlogError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        if stored.revoked {
            return Ok(false);
        }

        let revoked = self.token_repo.revoke(stored.id).await?;
        if revoked {
            info!(token_id = %stored.id, user_id = %stored.user_id, "Refresh token revoked");
        }
        Ok(revoked)
    }

    /// Revoke every outstanding refresh token of a user (e.g. on
    /// password change). Returns how many were revoked.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> ReadlogResult<u64> {
        let count = self.token_repo.revoke_all_for_user(user_id).await?;
        info!(user_id = %user_id, count, "All refresh tokens revoked");
        Ok(count)
    }

    /// Refresh tokens of a user that can still be redeemed.
    pub async fn active_sessions(&self, user_id: Uuid) -> ReadlogResult<Vec<RefreshToken>> {
        self.token_repo.list_active_by_user(user_id).await
    }

    /// Verify an access token issued by this service.
    pub fn authenticate(&self, access_token: &str) -> Result<ValidatedClaims, AuthError> {
        token::validate_access_token(access_token, &self.config)
    }

    async fn find_login_user(&self, email_or_username: &str) -> ReadlogResult<Option<User>> {
        match self.user_repo.get_by_email(email_or_username).await {
            Ok(user) => return Ok(Some(user)),
            Err(ReadlogError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        match self.user_repo.get_by_username(email_or_username).await {
            Ok(user) => Ok(Some(user)),
            Err(ReadlogError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn issue_access_token(&self, user: &User) -> ReadlogResult<IssuedAccessToken> {
        let roles = self.user_repo.get_roles(user.id).await?;
        Ok(token::issue_access_token(user, &roles, &self.config)?)
    }

    fn new_refresh_token(&self, user_id: Uuid) -> PendingRefreshToken {
        let raw = token::generate_refresh_token();
        let record = CreateRefreshToken {
            user_id,
            token_hash: token::hash_refresh_token(&raw),
            expires_at: Utc::now() + self.config.refresh_token_lifetime(),
        };
        PendingRefreshToken { raw, record }
    }

    /// Access token plus one newly persisted refresh token.
    async fn open_session(&self, user: &User) -> ReadlogResult<AuthTokens> {
        let access = self.issue_access_token(user).await?;
        let pending = self.new_refresh_token(user.id);
        let stored = self.token_repo.create(pending.record).await?;
        debug!(user_id = %user.id, token_id = %stored.id, "Refresh token issued");

        Ok(AuthTokens {
            access_token: access.token,
            refresh_token: pending.raw,
            access_token_expires_at: access.expires_at,
        })
    }
}
