//! Review log repository
//!
//! Append-only: there is intentionally no update or delete.

use crate::db::{with_pool, DynDatabasePool};
use crate::models::ReviewLog;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait ReviewLogRepository: Send + Sync {
    async fn append(&self, log: &ReviewLog) -> Result<ReviewLog>;

    /// Audit trail for one content item, oldest first
    async fn list_by_content(&self, content_id: &str) -> Result<Vec<ReviewLog>>;
}

pub struct SqlxReviewLogRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ReviewLogRow {
    id: String,
    content_id: String,
    action: String,
    actor_id: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewLogRow> for ReviewLog {
    type Error = anyhow::Error;

    fn try_from(row: ReviewLogRow) -> Result<Self> {
        Ok(ReviewLog {
            action: row
                .action
                .parse()
                .with_context(|| format!("Corrupt action on review log {}", row.id))?,
            id: row.id,
            content_id: row.content_id,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ReviewLogRepository for SqlxReviewLogRepository {
    async fn append(&self, log: &ReviewLog) -> Result<ReviewLog> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO review_logs (id, content_id, action, actor_id, note, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&log.id)
            .bind(&log.content_id)
            .bind(log.action.as_str())
            .bind(&log.actor_id)
            .bind(&log.note)
            .bind(log.created_at)
            .execute(p)
            .await
            .context("Failed to append review log")?;
        });
        Ok(log.clone())
    }

    async fn list_by_content(&self, content_id: &str) -> Result<Vec<ReviewLog>> {
        let rows: Vec<ReviewLogRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(
                r#"
                SELECT id, content_id, action, actor_id, note, created_at
                FROM review_logs
                WHERE content_id = ?
                ORDER BY created_at ASC, id ASC
                "#,
            )
            .bind(content_id)
            .fetch_all(p)
            .await
            .context("Failed to list review logs")?
        });
        rows.into_iter().map(ReviewLog::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{migrated_pool, seed_user, t};
    use crate::db::repositories::{ContentRepository, SqlxContentRepository};
    use crate::models::{ContentItem, ContentKind, ReviewAction, UserRole};

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        let pool = migrated_pool().await;
        seed_user(&pool, "p1", UserRole::User).await;
        let content = SqlxContentRepository::new(pool.clone());
        let mut item = ContentItem::new_draft(
            ContentKind::BlogPost,
            "p1".into(),
            "Airway".into(),
            None,
            "b".into(),
            "<p>b</p>".into(),
        );
        item.id = "c1".into();
        content.create(&item).await.unwrap();

        let repo = SqlxReviewLogRepository::new(pool);
        let mut later = ReviewLog::new("c1".into(), ReviewAction::Publish, "r1".into(), None);
        later.created_at = t(20);
        let mut earlier = ReviewLog::new("c1".into(), ReviewAction::Submit, "p1".into(), None);
        earlier.created_at = t(10);
        repo.append(&later).await.unwrap();
        repo.append(&earlier).await.unwrap();

        let logs = repo.list_by_content("c1").await.unwrap();
        let actions: Vec<_> = logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![ReviewAction::Submit, ReviewAction::Publish]);
        assert!(repo.list_by_content("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_for_missing_content_fails() {
        let pool = migrated_pool().await;
        let repo = SqlxReviewLogRepository::new(pool);
        let log = ReviewLog::new("ghost".into(), ReviewAction::Reject, "r1".into(), Some("x".into()));
        assert!(repo.append(&log).await.is_err());
    }
}
