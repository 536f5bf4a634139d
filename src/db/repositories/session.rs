//! Session repository
//!
//! Sessions are keyed by the SHA-256 hash of the bearer token.

use crate::db::{with_pool, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    async fn get(&self, token_hash: &str) -> Result<Option<Session>>;

    async fn delete(&self, token_hash: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;

    /// Delete sessions that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_hash: String,
    user_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            token_hash: row.token_hash,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO sessions (token_hash, user_id, expires_at, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&session.token_hash)
            .bind(&session.user_id)
            .bind(session.expires_at)
            .bind(session.created_at)
            .execute(p)
            .await
            .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get(&self, token_hash: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(
                "SELECT token_hash, user_id, expires_at, created_at FROM sessions WHERE token_hash = ?",
            )
            .bind(token_hash)
            .fetch_optional(p)
            .await
            .context("Failed to get session")?
        });
        Ok(row.map(Session::from))
    }

    async fn delete(&self, token_hash: &str) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
                .bind(token_hash)
                .execute(p)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(p)
                .await
                .context("Failed to delete sessions by user")?
                .rows_affected()
        });
        Ok(affected)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(p)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected()
        });
        Ok(affected)
    }
}
