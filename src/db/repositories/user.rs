//! User repository
//!
//! - `UserRepository` trait defining user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::db::{with_pool, DynDatabasePool};
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users holding a role, oldest first
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    /// Change a user's role. Returns the updated user, or `None` if missing.
    async fn update_role(&self, id: &str, role: UserRole) -> Result<Option<User>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    display_name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: row
                .role
                .parse()
                .with_context(|| format!("Corrupt role on user {}", row.id))?,
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_USER: &str =
    "SELECT id, email, display_name, role, created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO users (id, email, display_name, role, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(p)
            .await
            .context("Failed to create user")?;
        });
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        let row: Option<UserRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?
        });
        row.map(User::try_from).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE email = ?", SELECT_USER);
        let row: Option<UserRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(email)
                .fetch_optional(p)
                .await
                .context("Failed to get user by email")?
        });
        row.map(User::try_from).transpose()
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let sql = format!("{} WHERE role = ? ORDER BY created_at ASC, id ASC", SELECT_USER);
        let rows: Vec<UserRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(role.as_str())
                .fetch_all(p)
                .await
                .context("Failed to list users by role")?
        });
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_role(&self, id: &str, role: UserRole) -> Result<Option<User>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
                .bind(role.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update user role")?
                .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }
}
