//! Authentication errors.

use thiserror::Error;

use marigold_core::EmailError;

use crate::db::RepositoryError;

/// Why registration or sign-in failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Unknown email or wrong password. The two are not distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    UserAlreadyExists,

    #[error("password rejected: {0}")]
    WeakPassword(String),

    #[error("account storage failed: {0}")]
    Repository(#[from] RepositoryError),

    /// Argon2 could not hash or parse a hash.
    #[error("password hashing failed")]
    PasswordHash,
}
