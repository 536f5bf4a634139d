//! Review assignment tracker
//!
//! Maps submitted content to gurus and answers "what is on my plate":
//! - `list_pending` is FIFO by assignment time and only shows content that
//!   is awaiting review
//! - `list_decided` is the reviewer's read-only history, newest first
//! - `assign` is the admin operation that creates the mapping

use crate::config::ReviewConfig;
use crate::db::repositories::{
    AssignmentRepository, ContentRepository, ReviewLogRepository, UserRepository,
};
use crate::models::{
    AssignmentStatus, AssignmentWithContent, ContentStatus, ReviewAction, ReviewAssignment,
    ReviewLog,
};
use crate::services::notification::{NotificationDispatcher, Notices};
use chrono::Utc;
use std::sync::Arc;

const DECIDED_STATUSES: [AssignmentStatus; 3] = [
    AssignmentStatus::Completed,
    AssignmentStatus::Rejected,
    AssignmentStatus::ChangesRequested,
];

#[derive(Debug, thiserror::Error)]
pub enum AssignmentServiceError {
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Reviewer not found: {0}")]
    ReviewerNotFound(String),

    #[error("Invalid reviewer: {0}")]
    InvalidReviewer(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AssignmentService {
    assignment_repo: Arc<dyn AssignmentRepository>,
    content_repo: Arc<dyn ContentRepository>,
    user_repo: Arc<dyn UserRepository>,
    log_repo: Arc<dyn ReviewLogRepository>,
    dispatcher: NotificationDispatcher,
    notices: Notices,
    config: ReviewConfig,
}

impl AssignmentService {
    pub fn new(
        assignment_repo: Arc<dyn AssignmentRepository>,
        content_repo: Arc<dyn ContentRepository>,
        user_repo: Arc<dyn UserRepository>,
        log_repo: Arc<dyn ReviewLogRepository>,
        dispatcher: NotificationDispatcher,
        notices: Notices,
        config: ReviewConfig,
    ) -> Self {
        Self {
            assignment_repo,
            content_repo,
            user_repo,
            log_repo,
            dispatcher,
            notices,
            config,
        }
    }

    /// Pending assignments for a reviewer, oldest first.
    pub async fn list_pending(
        &self,
        reviewer_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<AssignmentWithContent>, AssignmentServiceError> {
        let limit = self.config.clamp_limit(limit);
        Ok(self.assignment_repo.list_pending(reviewer_id, limit).await?)
    }

    /// Non-pending assignments for a reviewer, newest first.
    ///
    /// `statuses` narrows the result; `None` means every decided status.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the filter asks for `pending`
    pub async fn list_decided(
        &self,
        reviewer_id: &str,
        statuses: Option<&[AssignmentStatus]>,
        limit: Option<i64>,
    ) -> Result<Vec<AssignmentWithContent>, AssignmentServiceError> {
        let statuses = match statuses {
            Some(filter) if filter.contains(&AssignmentStatus::Pending) => {
                return Err(AssignmentServiceError::ValidationError(
                    "pending is not a decided status".to_string(),
                ));
            }
            Some(filter) if !filter.is_empty() => filter,
            _ => &DECIDED_STATUSES[..],
        };
        let limit = self.config.clamp_limit(limit);
        Ok(self
            .assignment_repo
            .list_by_statuses(reviewer_id, statuses, limit)
            .await?)
    }

    /// Assign submitted content to a guru.
    ///
    /// Creating the assignment is the operation. Moving `submitted` content
    /// to `under_review`, the `assign` log entry, and the reviewer notice
    /// follow it; their failures are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// - `ContentNotFound` / `ReviewerNotFound` for unknown ids
    /// - `InvalidState` unless the content is submitted or under review
    /// - `InvalidReviewer` unless the reviewer is a guru or admin other than
    ///   the author
    /// - `Conflict` if the reviewer already holds a pending assignment for it
    pub async fn assign(
        &self,
        content_id: &str,
        reviewer_id: &str,
        actor_id: &str,
    ) -> Result<ReviewAssignment, AssignmentServiceError> {
        let item = self
            .content_repo
            .get_by_id(content_id)
            .await?
            .ok_or_else(|| AssignmentServiceError::ContentNotFound(content_id.to_string()))?;
        if !item.status.awaits_review() {
            return Err(AssignmentServiceError::InvalidState(format!(
                "content is {}, not awaiting review",
                item.status
            )));
        }

        let reviewer = self
            .user_repo
            .get_by_id(reviewer_id)
            .await?
            .ok_or_else(|| AssignmentServiceError::ReviewerNotFound(reviewer_id.to_string()))?;
        if !reviewer.can_review() {
            return Err(AssignmentServiceError::InvalidReviewer(format!(
                "{} is not a guru",
                reviewer.display_name
            )));
        }
        if item.author_id == reviewer.id {
            return Err(AssignmentServiceError::InvalidReviewer(
                "authors cannot review their own content".to_string(),
            ));
        }

        if self
            .assignment_repo
            .find_pending(content_id, reviewer_id)
            .await?
            .is_some()
        {
            return Err(AssignmentServiceError::Conflict(
                "reviewer already has this content pending".to_string(),
            ));
        }

        let assignment = self
            .assignment_repo
            .create(&ReviewAssignment::pending(
                content_id.to_string(),
                reviewer_id.to_string(),
            ))
            .await?;

        if item.status == ContentStatus::Submitted {
            if let Err(e) = self
                .content_repo
                .update_status(content_id, ContentStatus::UnderReview, Utc::now())
                .await
            {
                tracing::error!(content_id, "Failed to move content under review: {:#}", e);
            }
        }

        let log = ReviewLog::new(
            content_id.to_string(),
            ReviewAction::Assign,
            actor_id.to_string(),
            Some(format!("assigned to {}", reviewer_id)),
        );
        if let Err(e) = self.log_repo.append(&log).await {
            tracing::error!(content_id, "Failed to append assign log: {:#}", e);
        }

        self.dispatcher
            .dispatch(self.notices.assigned(&item, reviewer_id));
        tracing::info!(content_id, reviewer_id, actor_id, "Review assigned");
        Ok(assignment)
    }
}
