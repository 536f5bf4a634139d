//! Content repository
//!
//! Storage for blog posts and exam questions. Status writes are single-row
//! updates keyed by id; there is no compare-and-swap on the prior status.

use crate::db::{with_pool, DynDatabasePool};
use crate::models::{ContentItem, ContentStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a new content item
    async fn create(&self, item: &ContentItem) -> Result<ContentItem>;

    async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>>;

    /// Persist edited draft fields (title, category, body, body_html, updated_at)
    async fn update_draft(&self, item: &ContentItem) -> Result<bool>;

    /// Set the status alone. Returns `false` if no row matched.
    async fn update_status(
        &self,
        id: &str,
        status: ContentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Move to `submitted` and stamp `submitted_at`
    async fn mark_submitted(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Record a reviewer verdict: status, `reviewed_by` and `reviewed_at`
    async fn record_decision(
        &self,
        id: &str,
        status: ContentStatus,
        reviewer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// An author's items, most recently updated first
    async fn list_by_author(
        &self,
        author_id: &str,
        status: Option<ContentStatus>,
        limit: i64,
    ) -> Result<Vec<ContentItem>>;

    /// Every item, most recently updated first
    async fn list_all(&self, status: Option<ContentStatus>, limit: i64)
        -> Result<Vec<ContentItem>>;
}

pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: String,
    kind: String,
    author_id: String,
    title: String,
    category: Option<String>,
    body: String,
    body_html: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ContentRow> for ContentItem {
    type Error = anyhow::Error;

    fn try_from(row: ContentRow) -> Result<Self> {
        let kind = row
            .kind
            .parse()
            .with_context(|| format!("Corrupt kind on content {}", row.id))?;
        let status = row
            .status
            .parse()
            .with_context(|| format!("Corrupt status on content {}", row.id))?;
        Ok(ContentItem {
            id: row.id,
            kind,
            author_id: row.author_id,
            title: row.title,
            category: row.category,
            body: row.body,
            body_html: row.body_html,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
        })
    }
}

const SELECT_CONTENT: &str = r#"
    SELECT id, kind, author_id, title, category, body, body_html, status,
           created_at, updated_at, submitted_at, reviewed_by, reviewed_at
    FROM content_items
"#;

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, item: &ContentItem) -> Result<ContentItem> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO content_items
                    (id, kind, author_id, title, category, body, body_html, status,
                     created_at, updated_at, submitted_at, reviewed_by, reviewed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(item.kind.as_str())
            .bind(&item.author_id)
            .bind(&item.title)
            .bind(&item.category)
            .bind(&item.body)
            .bind(&item.body_html)
            .bind(item.status.as_str())
            .bind(item.created_at)
            .bind(item.updated_at)
            .bind(item.submitted_at)
            .bind(&item.reviewed_by)
            .bind(item.reviewed_at)
            .execute(p)
            .await
            .context("Failed to create content item")?;
        });
        Ok(item.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>> {
        let sql = format!("{} WHERE id = ?", SELECT_CONTENT);
        let row: Option<ContentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get content by ID")?
        });
        row.map(ContentItem::try_from).transpose()
    }

    async fn update_draft(&self, item: &ContentItem) -> Result<bool> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE content_items
                SET title = ?, category = ?, body = ?, body_html = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&item.title)
            .bind(&item.category)
            .bind(&item.body)
            .bind(&item.body_html)
            .bind(item.updated_at)
            .bind(&item.id)
            .execute(p)
            .await
            .context("Failed to update content draft")?
            .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn update_status(
        &self,
        id: &str,
        status: ContentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("UPDATE content_items SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(at)
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update content status")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn mark_submitted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE content_items SET status = ?, submitted_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(ContentStatus::Submitted.as_str())
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(p)
            .await
            .context("Failed to mark content submitted")?
            .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn record_decision(
        &self,
        id: &str,
        status: ContentStatus,
        reviewer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE content_items
                SET status = ?, reviewed_by = ?, reviewed_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(reviewer_id)
            .bind(at)
            .bind(at)
            .bind(id)
            .execute(p)
            .await
            .context("Failed to record content decision")?
            .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_by_author(
        &self,
        author_id: &str,
        status: Option<ContentStatus>,
        limit: i64,
    ) -> Result<Vec<ContentItem>> {
        let sql = format!(
            "{} WHERE author_id = ? AND (? IS NULL OR status = ?) ORDER BY updated_at DESC, id DESC LIMIT ?",
            SELECT_CONTENT
        );
        let status = status.map(|s| s.as_str());
        let rows: Vec<ContentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(author_id)
                .bind(status)
                .bind(status)
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list content by author")?
        });
        rows.into_iter().map(ContentItem::try_from).collect()
    }

    async fn list_all(
        &self,
        status: Option<ContentStatus>,
        limit: i64,
    ) -> Result<Vec<ContentItem>> {
        let sql = format!(
            "{} WHERE (? IS NULL OR status = ?) ORDER BY updated_at DESC, id DESC LIMIT ?",
            SELECT_CONTENT
        );
        let status = status.map(|s| s.as_str());
        let rows: Vec<ContentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(status)
                .bind(status)
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list content")?
        });
        rows.into_iter().map(ContentItem::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{migrated_pool, seed_user, t};
    use crate::models::{ContentKind, UserRole};

    fn item(id: &str, author: &str, updated_offset: i64) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            kind: ContentKind::ExamQuestion,
            author_id: author.to_string(),
            title: format!("Question {}", id),
            category: Some("FRCEM".to_string()),
            body: "Which drug?".to_string(),
            body_html: "<p>Which drug?</p>".to_string(),
            status: ContentStatus::Draft,
            created_at: t(0),
            updated_at: t(updated_offset),
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    async fn setup() -> SqlxContentRepository {
        let pool = migrated_pool().await;
        seed_user(&pool, "a1", UserRole::User).await;
        seed_user(&pool, "a2", UserRole::User).await;
        seed_user(&pool, "g1", UserRole::Guru).await;
        SqlxContentRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let repo = setup().await;
        let created = repo.create(&item("c1", "a1", 0)).await.unwrap();

        let fetched = repo.get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_transitions_stamp_fields() {
        let repo = setup().await;
        repo.create(&item("c1", "a1", 0)).await.unwrap();

        assert!(repo.mark_submitted("c1", t(10)).await.unwrap());
        let submitted = repo.get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(submitted.status, ContentStatus::Submitted);
        assert_eq!(submitted.submitted_at, Some(t(10)));

        assert!(repo
            .update_status("c1", ContentStatus::UnderReview, t(20))
            .await
            .unwrap());

        assert!(repo
            .record_decision("c1", ContentStatus::Published, "g1", t(30))
            .await
            .unwrap());
        let decided = repo.get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(decided.status, ContentStatus::Published);
        assert_eq!(decided.reviewed_by.as_deref(), Some("g1"));
        assert_eq!(decided.reviewed_at, Some(t(30)));
        assert_eq!(decided.updated_at, t(30));
    }

    #[tokio::test]
    async fn test_updates_on_missing_row_report_false() {
        let repo = setup().await;
        assert!(!repo.mark_submitted("ghost", t(1)).await.unwrap());
        assert!(!repo
            .record_decision("ghost", ContentStatus::Rejected, "g1", t(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_by_author_filters_and_orders() {
        let repo = setup().await;
        repo.create(&item("old", "a1", 1)).await.unwrap();
        repo.create(&item("new", "a1", 5)).await.unwrap();
        repo.create(&item("other", "a2", 9)).await.unwrap();
        repo.mark_submitted("old", t(2)).await.unwrap();

        let all = repo.list_by_author("a1", None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        let drafts = repo
            .list_by_author("a1", Some(ContentStatus::Draft), 10)
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, "new");

        assert_eq!(repo.list_by_author("a1", None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_with_status_filter() {
        let repo = setup().await;
        repo.create(&item("c1", "a1", 1)).await.unwrap();
        repo.create(&item("c2", "a2", 2)).await.unwrap();
        repo.mark_submitted("c2", t(3)).await.unwrap();

        assert_eq!(repo.list_all(None, 10).await.unwrap().len(), 2);
        let submitted = repo
            .list_all(Some(ContentStatus::Submitted), 10)
            .await
            .unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].id, "c2");
    }

    #[tokio::test]
    async fn test_update_draft_fields() {
        let repo = setup().await;
        let mut draft = repo.create(&item("c1", "a1", 0)).await.unwrap();
        draft.title = "Revised stem".to_string();
        draft.category = None;
        draft.updated_at = t(50);
        assert!(repo.update_draft(&draft).await.unwrap());

        let fetched = repo.get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Revised stem");
        assert!(fetched.category.is_none());
        assert_eq!(fetched.updated_at, t(50));
    }
}
