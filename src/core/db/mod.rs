//! Database module for Gatekey
//!
//! This module provides database connectivity, models, and repositories
//! for persistent storage using PostgreSQL and SQLx.

pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used items
pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations, health_check};
pub use repositories::{
    PasswordResetRepository, PasswordResetRepositoryError, PgPasswordResetRepository,
    PgRefreshTokenRepository, PgUserRepository, RefreshTokenRepository,
    RefreshTokenRepositoryError, UserRepository, UserRepositoryError,
};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
