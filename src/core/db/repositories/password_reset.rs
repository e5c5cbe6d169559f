//! Password reset token repository for database operations
//!
//! Reset tokens are single-use: `find_valid` only returns rows that are
//! unused and unexpired, and `mark_used` is a conditional update so a token
//! cannot be consumed twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::auth::password::hash_token;
use crate::core::db::models::PasswordResetToken;

/// Password reset repository error types
#[derive(Debug, thiserror::Error)]
pub enum PasswordResetRepositoryError {
    #[error("Reset token not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Storage port for password reset tokens
#[async_trait]
pub trait PasswordResetRepository: Send + Sync + 'static {
    /// Persist a new reset token row for a raw token
    async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, PasswordResetRepositoryError>;

    /// Look up a raw token, returning it only while unused and unexpired
    async fn find_valid(
        &self,
        raw_token: &str,
    ) -> Result<Option<PasswordResetToken>, PasswordResetRepositoryError>;

    /// Consume a token. Returns `false` when it was already used.
    async fn mark_used(&self, id: Uuid) -> Result<bool, PasswordResetRepositoryError>;

    /// Delete used and expired tokens, returning how many were removed
    async fn sweep_expired(&self) -> Result<u64, PasswordResetRepositoryError>;
}

/// PostgreSQL-backed password reset repository
#[derive(Clone)]
pub struct PgPasswordResetRepository {
    pool: PgPool,
}

impl PgPasswordResetRepository {
    /// Create a new password reset repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for PgPasswordResetRepository {
    async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, PasswordResetRepositoryError> {
        let token_hash = hash_token(raw_token);

        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, used_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn find_valid(
        &self,
        raw_token: &str,
    ) -> Result<Option<PasswordResetToken>, PasswordResetRepositoryError> {
        let token_hash = hash_token(raw_token);

        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool, PasswordResetRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE id = $1 AND used_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self) -> Result<u64, PasswordResetRepositoryError> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE used_at IS NOT NULL OR expires_at < NOW()",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
