//! User repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::UserStore;
use crate::{
    error::AccountError,
    models::{NewUser, UpdateUser, User},
};

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert(&self, new_user: &NewUser) -> Result<User, AccountError> {
        info!("Creating new user: {}", new_user.email);

        let row = sqlx::query(
            r#"
            INSERT INTO users (email, name, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, name, password_hash, is_active, is_staff, is_superuser,
                      created_at, updated_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.is_staff)
        .bind(new_user.is_superuser)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if common::error::is_unique_violation(&e) {
                AccountError::EmailTaken(new_user.email.clone())
            } else {
                AccountError::Database(e)
            }
        })?;

        Ok(user_from_row(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, is_active, is_staff, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, is_active, is_staff, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn update(&self, id: Uuid, changes: &UpdateUser) -> Result<Option<User>, AccountError> {
        info!("Updating user: {}", id);

        let row = sqlx::query(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, password_hash, is_active, is_staff, is_superuser,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &changes.email {
            Some(email) if common::error::is_unique_violation(&e) => {
                AccountError::EmailTaken(email.clone())
            }
            _ => AccountError::Database(e),
        })?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn health_check(&self) -> bool {
        common::database::health_check(&self.pool)
            .await
            .unwrap_or(false)
    }
}
