//! Refresh token repository for database operations
//!
//! Raw tokens never touch the database: they are hashed with SHA-256 on the
//! way in and looked up by hash on the way out. Revocation is a conditional
//! update so that each token can be consumed at most once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::auth::password::hash_token;
use crate::core::db::models::RefreshToken;

/// Refresh token repository error types
#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenRepositoryError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Storage port for refresh token sessions
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + 'static {
    /// Persist a new session row for a raw refresh token
    async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, RefreshTokenRepositoryError>;

    /// Look up a session by its raw token
    async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenRepositoryError>;

    /// Revoke a session, recording its successor when rotating.
    ///
    /// Returns `true` only for the caller that actually flipped the row;
    /// an already-revoked session returns `false` and keeps its original
    /// `replaced_by` value.
    async fn revoke(
        &self,
        id: Uuid,
        replaced_by: Option<Uuid>,
    ) -> Result<bool, RefreshTokenRepositoryError>;

    /// Revoke every active session for a user, returning how many were hit
    async fn revoke_all_for_user(&self, user_id: Uuid)
    -> Result<u64, RefreshTokenRepositoryError>;

    /// Delete sessions past their expiry, returning how many were removed
    async fn delete_expired(&self) -> Result<u64, RefreshTokenRepositoryError>;
}

/// PostgreSQL-backed refresh token repository
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    /// Create a new refresh token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(
        &self,
        user_id: Uuid,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, RefreshTokenRepositoryError> {
        let token_hash = hash_token(raw_token);

        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, revoked_at, replaced_by, created_at
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    async fn find_by_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenRepositoryError> {
        let token_hash = hash_token(raw_token);

        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, revoked_at, replaced_by, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn revoke(
        &self,
        id: Uuid,
        replaced_by: Option<Uuid>,
    ) -> Result<bool, RefreshTokenRepositoryError> {
        // The revoked_at guard makes revocation first-writer-wins under
        // concurrent rotation of the same token.
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW(), replaced_by = COALESCE($2, replaced_by)
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(replaced_by)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<u64, RefreshTokenRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> Result<u64, RefreshTokenRepositoryError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // ========================================================================
    // Error Type Tests
    // ========================================================================

    #[test]
    fn test_refresh_token_repository_error_display() {
        let err = RefreshTokenRepositoryError::NotFound;
        assert_eq!(format!("{}", err), "Refresh token not found");
    }

    // ========================================================================
    // Integration Tests (require database)
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_create_and_find_by_token() {
        let pool = create_test_pool().await;
        let repo = PgRefreshTokenRepository::new(pool.clone());
        let user_id = setup_test_user(&pool).await;

        let raw = "test_refresh_token_abc123";
        let expires_at = Utc::now() + Duration::days(7);

        let created = repo.create(user_id, raw, expires_at).await.unwrap();
        assert_eq!(created.user_id, user_id);
        assert_ne!(created.token_hash, raw, "raw token must not be stored");
        assert!(created.is_active());

        let found = repo.find_by_token(raw).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        let missing = repo.find_by_token("nonexistent").await.unwrap();
        assert!(missing.is_none());

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_revoke_is_exactly_once() {
        let pool = create_test_pool().await;
        let repo = PgRefreshTokenRepository::new(pool.clone());
        let user_id = setup_test_user(&pool).await;

        let expires_at = Utc::now() + Duration::days(7);
        let token = repo.create(user_id, "rotate_me", expires_at).await.unwrap();
        let successor = repo.create(user_id, "successor", expires_at).await.unwrap();

        let first = repo.revoke(token.id, Some(successor.id)).await.unwrap();
        assert!(first, "first revoke wins");

        let second = repo.revoke(token.id, None).await.unwrap();
        assert!(!second, "second revoke must report failure");

        let found = repo.find_by_token("rotate_me").await.unwrap().unwrap();
        assert!(found.is_revoked());
        // The losing revoke must not clobber the recorded successor
        assert_eq!(found.replaced_by, Some(successor.id));

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_revoke_without_successor() {
        let pool = create_test_pool().await;
        let repo = PgRefreshTokenRepository::new(pool.clone());
        let user_id = setup_test_user(&pool).await;

        let expires_at = Utc::now() + Duration::days(7);
        let token = repo.create(user_id, "logout_token", expires_at).await.unwrap();

        assert!(repo.revoke(token.id, None).await.unwrap());

        let found = repo.find_by_token("logout_token").await.unwrap().unwrap();
        assert!(found.is_revoked());
        assert!(found.replaced_by.is_none());

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_revoke_all_for_user() {
        let pool = create_test_pool().await;
        let repo = PgRefreshTokenRepository::new(pool.clone());
        let user_id = setup_test_user(&pool).await;

        let expires_at = Utc::now() + Duration::days(7);
        repo.create(user_id, "device_a", expires_at).await.unwrap();
        repo.create(user_id, "device_b", expires_at).await.unwrap();
        let revoked = repo.create(user_id, "device_c", expires_at).await.unwrap();
        repo.revoke(revoked.id, None).await.unwrap();

        // Only the two still-active sessions are hit
        let count = repo.revoke_all_for_user(user_id).await.unwrap();
        assert_eq!(count, 2);

        let found = repo.find_by_token("device_a").await.unwrap().unwrap();
        assert!(found.is_revoked());

        cleanup_test_user(&pool, user_id).await;
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_delete_expired() {
        let pool = create_test_pool().await;
        let repo = PgRefreshTokenRepository::new(pool.clone());
        let user_id = setup_test_user(&pool).await;

        let expired = Utc::now() - Duration::hours(1);
        let live = Utc::now() + Duration::days(7);
        repo.create(user_id, "stale_token", expired).await.unwrap();
        repo.create(user_id, "live_token", live).await.unwrap();

        let deleted = repo.delete_expired().await.unwrap();
        assert!(deleted >= 1);

        assert!(repo.find_by_token("stale_token").await.unwrap().is_none());
        assert!(repo.find_by_token("live_token").await.unwrap().is_some());

        cleanup_test_user(&pool, user_id).await;
    }

    // Helper functions for integration tests
    async fn create_test_pool() -> PgPool {
        use crate::core::db::pool::{DbConfig, create_pool};

        let config = DbConfig::from_env().expect("DATABASE_URL must be set for tests");
        create_pool(&config)
            .await
            .expect("Failed to create test pool")
    }

    async fn setup_test_user(pool: &PgPool) -> Uuid {
        let email = format!("token_test_{}@example.com", Uuid::new_v4());
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, '$2b$04$testhash')
            RETURNING id
            "#,
        )
        .bind(&email)
        .fetch_one(pool)
        .await
        .expect("Failed to create test user");
        row.0
    }

    async fn cleanup_test_user(pool: &PgPool, user_id: Uuid) {
        // Token rows are deleted by CASCADE
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to cleanup test user");
    }
}
