//! Readlog Database: credential hashing, SurrealDB connection
//! management, and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Password hashing and policy ([`password`])
//! - SurrealDB repositories ([`repository`]) and in-memory
//!   repositories ([`memory`]) for the `readlog-core` traits
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod memory;
pub mod password;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use password::{PasswordPolicy, UserStoreConfig, verify_password};
pub use schema::run_migrations;
