//! In-memory repository implementations.
//!
//! Both stores keep their state behind a single mutex, so every
//! check-then-write (uniqueness on create, compare-and-set on a token's
//! revoked flag) happens under one lock acquisition. Clones share state.

mod refresh_token;
mod user;

pub use refresh_token::MemoryRefreshTokenRepository;
pub use user::MemoryUserRepository;

use std::sync::{Mutex, MutexGuard};

use crate::error::DbError;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DbError> {
    mutex.lock().map_err(|_| DbError::Poisoned)
}
