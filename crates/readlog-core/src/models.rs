//! Domain models for Readlog authentication.

pub mod refresh_token;
pub mod user;
