//! User repository for database operations
//!
//! Users are hydrated in a single query: roles and permissions are
//! aggregated from their join tables into text arrays alongside the row.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::db::models::{CreateUser, UpdateProfile, User};

/// Shared SELECT fragment that hydrates a user together with its roles and
/// permissions arrays.
const SELECT_USER: &str = r#"
SELECT u.id, u.email, u.password_hash, u.first_name, u.last_name, u.phone,
       u.avatar_url, u.email_verified, u.email_verified_at, u.is_active,
       u.created_at, u.updated_at, u.last_login_at,
       COALESCE((SELECT array_agg(r.role ORDER BY r.role)
                 FROM user_roles r WHERE r.user_id = u.id), ARRAY[]::text[]) AS roles,
       COALESCE((SELECT array_agg(p.permission ORDER BY p.permission)
                 FROM user_permissions p WHERE p.user_id = u.id), ARRAY[]::text[]) AS permissions
FROM users u
"#;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

fn map_unique_violation(err: sqlx::Error) -> UserRepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return UserRepositoryError::EmailAlreadyExists;
    }
    UserRepositoryError::DatabaseError(err)
}

/// Storage port for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Insert a user together with its initial role rows
    async fn create(&self, user: &CreateUser) -> Result<User, UserRepositoryError>;

    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError>;

    /// Write a resolved profile state
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &UpdateProfile,
    ) -> Result<User, UserRepositoryError>;

    /// Replace the stored password digest
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserRepositoryError>;

    /// Stamp the last successful login
    async fn update_last_login(&self, id: Uuid) -> Result<(), UserRepositoryError>;

    /// Mark the account's email address as verified
    async fn mark_email_verified(&self, id: Uuid) -> Result<(), UserRepositoryError>;

    /// List users, newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserRepositoryError>;

    /// Count total users
    async fn count(&self) -> Result<i64, UserRepositoryError>;
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &CreateUser) -> Result<User, UserRepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (user_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        for role in &user.roles {
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        let created = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE u.email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &UpdateProfile,
    ) -> Result<User, UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2,
                first_name = $3,
                last_name = $4,
                phone = $5,
                avatar_url = $6,
                email_verified = $7,
                email_verified_at = $8,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.phone)
        .bind(&changes.avatar_url)
        .bind(changes.email_verified)
        .bind(changes.email_verified_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        self.find_by_id(id)
            .await?
            .ok_or(UserRepositoryError::NotFound)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<(), UserRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verified_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, UserRepositoryError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} ORDER BY u.created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
