//! User repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::models::user::{User, UserRole, CreateUserRequest, UpdateProfileRequest};
use crate::utils::errors::VisaPilotError;

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a profile row unless one already exists for the identity id.
    ///
    /// Returns `None` when the row was already present.
    pub async fn create_if_absent(&self, request: CreateUserRequest) -> Result<Option<User>, VisaPilotError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, phone, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'client', $5, $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, email, full_name, phone, role, paid_at, created_at, updated_at
            "#
        )
        .bind(request.id)
        .bind(request.email)
        .bind(request.full_name)
        .bind(request.phone)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, VisaPilotError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, phone, role, paid_at, created_at, updated_at FROM users WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update self-editable profile fields
    pub async fn update_profile(&self, id: Uuid, request: UpdateProfileRequest) -> Result<User, VisaPilotError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                updated_at = $4
            WHERE id = $1
            RETURNING id, email, full_name, phone, role, paid_at, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.full_name)
        .bind(request.phone)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("User", id))?;

        Ok(user)
    }

    /// Set role
    pub async fn set_role(&self, id: Uuid, role: UserRole) -> Result<User, VisaPilotError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, email, full_name, phone, role, paid_at, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(role)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("User", id))?;

        Ok(user)
    }

    /// Record that the user has paid, bypassing checkout
    pub async fn set_paid_at(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<User, VisaPilotError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET paid_at = $2, updated_at = $2
            WHERE id = $1
            RETURNING id, email, full_name, phone, role, paid_at, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VisaPilotError::not_found("User", id))?;

        Ok(user)
    }

    /// Delete user
    pub async fn delete(&self, id: Uuid) -> Result<(), VisaPilotError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// List all users, newest first
    pub async fn list(&self) -> Result<Vec<User>, VisaPilotError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, phone, role, paid_at, created_at, updated_at FROM users ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, VisaPilotError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
