//! Database repositories for Gatekey
//!
//! This module provides repository implementations for database operations.
//! Each repository pairs a storage trait with its PostgreSQL implementation
//! so the service layer can be exercised against test doubles.

pub mod password_reset;
pub mod refresh_token;
pub mod user;

pub use password_reset::{
    PasswordResetRepository, PasswordResetRepositoryError, PgPasswordResetRepository,
};
pub use refresh_token::{
    PgRefreshTokenRepository, RefreshTokenRepository, RefreshTokenRepositoryError,
};
pub use user::{PgUserRepository, UserRepository, UserRepositoryError};
