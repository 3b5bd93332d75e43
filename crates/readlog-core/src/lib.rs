//! Readlog Core: domain models, error types, and repository trait
//! definitions shared by the database and authentication crates.

pub mod error;
pub mod models;
pub mod repository;
