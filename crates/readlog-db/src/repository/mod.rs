//! SurrealDB repository implementations.

mod refresh_token;
mod user;

pub use refresh_token::SurrealRefreshTokenRepository;
pub use user::SurrealUserRepository;
