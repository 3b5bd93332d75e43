//! Readlog Auth: registration, login, JWT access-token issuance and
//! single-use refresh-token rotation.

pub mod config;
pub mod error;
pub mod result;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use result::{AuthErrorKind, AuthFailure, AuthResult, AuthTokens};
pub use service::{AuthService, LoginInput, RegisterInput};
pub use token::AccessTokenClaims;
