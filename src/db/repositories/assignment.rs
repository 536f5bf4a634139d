//! Review assignment repository
//!
//! Pending lists are FIFO by assignment time and only show content that is
//! awaiting review (`submitted` or `under_review`).

use crate::db::{with_pool, DynDatabasePool};
use crate::models::{AssignmentStatus, AssignmentWithContent, ReviewAssignment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &ReviewAssignment) -> Result<ReviewAssignment>;

    /// The open assignment for (content, reviewer), if any
    async fn find_pending(
        &self,
        content_id: &str,
        reviewer_id: &str,
    ) -> Result<Option<ReviewAssignment>>;

    /// Pending work for a reviewer, oldest assignment first
    async fn list_pending(&self, reviewer_id: &str, limit: i64)
        -> Result<Vec<AssignmentWithContent>>;

    /// A reviewer's assignments in any of `statuses`, most recently updated first
    async fn list_by_statuses(
        &self,
        reviewer_id: &str,
        statuses: &[AssignmentStatus],
        limit: i64,
    ) -> Result<Vec<AssignmentWithContent>>;

    /// Close the pending assignment keyed by (content, reviewer).
    ///
    /// Returns the number of rows updated; zero means there was nothing open.
    async fn resolve_pending(
        &self,
        content_id: &str,
        reviewer_id: &str,
        status: AssignmentStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn list_by_content(&self, content_id: &str) -> Result<Vec<ReviewAssignment>>;
}

pub struct SqlxAssignmentRepository {
    pool: DynDatabasePool,
}

impl SqlxAssignmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AssignmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    content_id: String,
    reviewer_id: String,
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for ReviewAssignment {
    type Error = anyhow::Error;

    fn try_from(row: AssignmentRow) -> Result<Self> {
        Ok(ReviewAssignment {
            status: row
                .status
                .parse()
                .with_context(|| format!("Corrupt status on assignment {}", row.id))?,
            id: row.id,
            content_id: row.content_id,
            reviewer_id: row.reviewer_id,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentContentRow {
    #[sqlx(flatten)]
    assignment: AssignmentRow,
    kind: String,
    title: String,
    category: Option<String>,
    content_status: String,
    author_id: String,
}

impl TryFrom<AssignmentContentRow> for AssignmentWithContent {
    type Error = anyhow::Error;

    fn try_from(row: AssignmentContentRow) -> Result<Self> {
        let assignment = ReviewAssignment::try_from(row.assignment)?;
        let kind = row
            .kind
            .parse()
            .with_context(|| format!("Corrupt kind on content {}", assignment.content_id))?;
        let content_status = row
            .content_status
            .parse()
            .with_context(|| format!("Corrupt status on content {}", assignment.content_id))?;
        Ok(AssignmentWithContent {
            assignment,
            kind,
            title: row.title,
            category: row.category,
            content_status,
            author_id: row.author_id,
        })
    }
}

const SELECT_ASSIGNMENT: &str = r#"
    SELECT id, content_id, reviewer_id, status, note, created_at, updated_at
    FROM review_assignments
"#;

const SELECT_WITH_CONTENT: &str = r#"
    SELECT a.id, a.content_id, a.reviewer_id, a.status, a.note, a.created_at, a.updated_at,
           c.kind, c.title, c.category, c.status AS content_status, c.author_id
    FROM review_assignments a
    JOIN content_items c ON c.id = a.content_id
"#;

#[async_trait]
impl AssignmentRepository for SqlxAssignmentRepository {
    async fn create(&self, assignment: &ReviewAssignment) -> Result<ReviewAssignment> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO review_assignments
                    (id, content_id, reviewer_id, status, note, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&assignment.id)
            .bind(&assignment.content_id)
            .bind(&assignment.reviewer_id)
            .bind(assignment.status.as_str())
            .bind(&assignment.note)
            .bind(assignment.created_at)
            .bind(assignment.updated_at)
            .execute(p)
            .await
            .context("Failed to create review assignment")?;
        });
        Ok(assignment.clone())
    }

    async fn find_pending(
        &self,
        content_id: &str,
        reviewer_id: &str,
    ) -> Result<Option<ReviewAssignment>> {
        let sql = format!(
            "{} WHERE content_id = ? AND reviewer_id = ? AND status = ? ORDER BY created_at ASC, id ASC LIMIT 1",
            SELECT_ASSIGNMENT
        );
        let row: Option<AssignmentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(content_id)
                .bind(reviewer_id)
                .bind(AssignmentStatus::Pending.as_str())
                .fetch_optional(p)
                .await
                .context("Failed to find pending assignment")?
        });
        row.map(ReviewAssignment::try_from).transpose()
    }

    async fn list_pending(
        &self,
        reviewer_id: &str,
        limit: i64,
    ) -> Result<Vec<AssignmentWithContent>> {
        let sql = format!(
            r#"{}
            WHERE a.reviewer_id = ? AND a.status = ? AND c.status IN (?, ?)
            ORDER BY a.created_at ASC, a.id ASC
            LIMIT ?"#,
            SELECT_WITH_CONTENT
        );
        let rows: Vec<AssignmentContentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(reviewer_id)
                .bind(AssignmentStatus::Pending.as_str())
                .bind(crate::models::ContentStatus::Submitted.as_str())
                .bind(crate::models::ContentStatus::UnderReview.as_str())
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list pending assignments")?
        });
        rows.into_iter().map(AssignmentWithContent::try_from).collect()
    }

    async fn list_by_statuses(
        &self,
        reviewer_id: &str,
        statuses: &[AssignmentStatus],
        limit: i64,
    ) -> Result<Vec<AssignmentWithContent>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            r#"{}
            WHERE a.reviewer_id = ? AND a.status IN ({})
            ORDER BY a.updated_at DESC, a.id DESC
            LIMIT ?"#,
            SELECT_WITH_CONTENT, placeholders
        );
        let rows: Vec<AssignmentContentRow> = with_pool!(self.pool, |p| {
            let mut query = sqlx::query_as(&sql).bind(reviewer_id);
            for status in statuses {
                query = query.bind(status.as_str());
            }
            query
                .bind(limit)
                .fetch_all(p)
                .await
                .context("Failed to list assignments by status")?
        });
        rows.into_iter().map(AssignmentWithContent::try_from).collect()
    }

    async fn resolve_pending(
        &self,
        content_id: &str,
        reviewer_id: &str,
        status: AssignmentStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE review_assignments
                SET status = ?, note = ?, updated_at = ?
                WHERE content_id = ? AND reviewer_id = ? AND status = ?
                "#,
            )
            .bind(status.as_str())
            .bind(note)
            .bind(at)
            .bind(content_id)
            .bind(reviewer_id)
            .bind(AssignmentStatus::Pending.as_str())
            .execute(p)
            .await
            .context("Failed to resolve pending assignment")?
            .rows_affected()
        });
        Ok(affected)
    }

    async fn list_by_content(&self, content_id: &str) -> Result<Vec<ReviewAssignment>> {
        let sql = format!(
            "{} WHERE content_id = ? ORDER BY created_at ASC, id ASC",
            SELECT_ASSIGNMENT
        );
        let rows: Vec<AssignmentRow> = with_pool!(self.pool, |p| {
            sqlx::query_as(&sql)
                .bind(content_id)
                .fetch_all(p)
                .await
                .context("Failed to list assignments for content")?
        });
        rows.into_iter().map(ReviewAssignment::try_from).collect()
    }
}
