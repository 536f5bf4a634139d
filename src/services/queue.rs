//! Queue views
//!
//! Read-only projections for each audience. The service decides which
//! actions a row offers; it never writes.

use crate::config::ReviewConfig;
use crate::db::repositories::{AssignmentRepository, ContentRepository};
use crate::models::{
    AssignmentStatus, AssignmentWithContent, ContentItem, ContentStatus, QueueAction,
    QueueAudience, QueueRow, QueueView,
};
use anyhow::Result;
use std::sync::Arc;

const RETURNED_STATUSES: [AssignmentStatus; 2] =
    [AssignmentStatus::Rejected, AssignmentStatus::ChangesRequested];

pub struct QueueService {
    content_repo: Arc<dyn ContentRepository>,
    assignment_repo: Arc<dyn AssignmentRepository>,
    config: ReviewConfig,
}

impl QueueService {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        assignment_repo: Arc<dyn AssignmentRepository>,
        config: ReviewConfig,
    ) -> Self {
        Self {
            content_repo,
            assignment_repo,
            config,
        }
    }

    /// The author's own items. Drafts can be edited and submitted.
    pub async fn author_queue(
        &self,
        author_id: &str,
        status: Option<ContentStatus>,
        limit: Option<i64>,
    ) -> Result<QueueView> {
        let items = self
            .content_repo
            .list_by_author(author_id, status, self.config.clamp_limit(limit))
            .await?;
        let rows = items
            .into_iter()
            .map(|item| {
                let actions = match item.status {
                    ContentStatus::Draft => vec![QueueAction::Edit, QueueAction::Submit],
                    _ => Vec::new(),
                };
                content_row(item, actions)
            })
            .collect();
        Ok(QueueView::new(QueueAudience::Author, rows))
    }

    pub async fn pending_queue(&self, reviewer_id: &str, limit: Option<i64>) -> Result<QueueView> {
        let pending = self
            .assignment_repo
            .list_pending(reviewer_id, self.config.clamp_limit(limit))
            .await?;
        let rows = pending
            .into_iter()
            .map(|entry| {
                let created_at = entry.assignment.created_at;
                assignment_row(
                    entry,
                    created_at,
                    vec![
                        QueueAction::Publish,
                        QueueAction::Reject,
                        QueueAction::RequestChanges,
                    ],
                )
            })
            .collect();
        Ok(QueueView::new(QueueAudience::ReviewerPending, rows))
    }

    /// Items this reviewer rejected or sent back. Rows never carry actions.
    pub async fn rejected_by_me(&self, reviewer_id: &str, limit: Option<i64>) -> Result<QueueView> {
        let returned = self
            .assignment_repo
            .list_by_statuses(
                reviewer_id,
                &RETURNED_STATUSES,
                self.config.clamp_limit(limit),
            )
            .await?;
        let rows = returned
            .into_iter()
            .map(|entry| {
                let updated_at = entry.assignment.updated_at;
                assignment_row(entry, updated_at, Vec::new())
            })
            .collect();
        Ok(QueueView::new(QueueAudience::RejectedByMe, rows))
    }

    /// Every item. Anything awaiting review can be assigned.
    pub async fn admin_queue(
        &self,
        status: Option<ContentStatus>,
        limit: Option<i64>,
    ) -> Result<QueueView> {
        let items = self
            .content_repo
            .list_all(status, self.config.clamp_limit(limit))
            .await?;
        let rows = items
            .into_iter()
            .map(|item| {
                let actions = if item.status.awaits_review() {
                    vec![QueueAction::Assign]
                } else {
                    Vec::new()
                };
                content_row(item, actions)
            })
            .collect();
        Ok(QueueView::new(QueueAudience::Admin, rows))
    }
}

fn content_row(item: ContentItem, actions: Vec<QueueAction>) -> QueueRow {
    QueueRow {
        content_id: item.id,
        assignment_id: None,
        kind: item.kind,
        title: item.title,
        category: item.category,
        author_id: item.author_id,
        content_status: item.status,
        assignment_status: None,
        note: None,
        timestamp: item.updated_at,
        actions,
    }
}

fn assignment_row(
    entry: AssignmentWithContent,
    timestamp: chrono::DateTime<chrono::Utc>,
    actions: Vec<QueueAction>,
) -> QueueRow {
    QueueRow {
        content_id: entry.assignment.content_id,
        assignment_id: Some(entry.assignment.id),
        kind: entry.kind,
        title: entry.title,
        category: entry.category,
        author_id: entry.author_id,
        content_status: entry.content_status,
        assignment_status: Some(entry.assignment.status),
        note: entry.assignment.note,
        timestamp,
        actions,
    }
}
