//! Reviewer decisions
//!
//! A decision is three dependent writes issued in order: the content status,
//! the review log entry, and the reviewer's pending assignment. Only the
//! first one can fail the call. The other two are attempted once it has
//! succeeded and their outcome is reported back to the caller.
//!
//! There is no transaction spanning the writes and no compare-and-swap on
//! the content status. A reviewer whose assignment was left pending by a
//! partial failure or a lost race stops seeing the item because the pending
//! list only shows content that is awaiting review. The same filter hides
//! other reviewers' assignments while a draft is back with its author, and
//! brings them back when it is resubmitted.

use crate::config::ReviewConfig;
use crate::db::repositories::{AssignmentRepository, ContentRepository, ReviewLogRepository};
use crate::models::{
    AssignmentStatus, ContentItem, ContentStatus, Decision, ReviewAction, ReviewLog,
};
use crate::services::notification::{NotificationDispatcher, Notices};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    /// The content already carries a terminal verdict
    #[error("Already decided: {0}")]
    AlreadyDecided(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What happened to the reviewer's pending assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentUpdate {
    Updated,
    NoPendingAssignment,
    Failed,
}

/// Result of a decision whose content write succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub content: ContentItem,
    /// `None` when the log append failed
    pub log: Option<ReviewLog>,
    pub assignment: AssignmentUpdate,
}

impl DecisionOutcome {
    /// True when every follow-up write landed.
    pub fn is_complete(&self) -> bool {
        self.log.is_some() && self.assignment != AssignmentUpdate::Failed
    }
}

pub struct DecisionService {
    content_repo: Arc<dyn ContentRepository>,
    assignment_repo: Arc<dyn AssignmentRepository>,
    log_repo: Arc<dyn ReviewLogRepository>,
    dispatcher: NotificationDispatcher,
    notices: Notices,
    config: ReviewConfig,
}

impl DecisionService {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        assignment_repo: Arc<dyn AssignmentRepository>,
        log_repo: Arc<dyn ReviewLogRepository>,
        dispatcher: NotificationDispatcher,
        notices: Notices,
        config: ReviewConfig,
    ) -> Self {
        Self {
            content_repo,
            assignment_repo,
            log_repo,
            dispatcher,
            notices,
            config,
        }
    }

    /// Publish or reject content.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if a rejection has no note or the note is too long;
    ///   nothing is read or written
    /// - `NotFound` if the content does not exist
    /// - `AlreadyDecided` if it is already published or rejected
    /// - `InvalidState` if it is still a draft or the reviewer wrote it
    /// - `InternalError` if the content write fails; nothing else is written
    pub async fn decide(
        &self,
        content_id: &str,
        reviewer_id: &str,
        decision: Decision,
        note: Option<&str>,
    ) -> Result<DecisionOutcome, DecisionError> {
        let note = self.normalize_note(note)?;
        if decision == Decision::Reject && note.is_none() {
            return Err(DecisionError::ValidationError(
                "A rejection needs a note for the author".to_string(),
            ));
        }

        let mut item = self.load_reviewable(content_id, reviewer_id).await?;
        let now = Utc::now();
        let target = decision.content_status();
        if !self
            .content_repo
            .record_decision(content_id, target, reviewer_id, now)
            .await?
        {
            return Err(DecisionError::NotFound(content_id.to_string()));
        }
        item.status = target;
        item.reviewed_by = Some(reviewer_id.to_string());
        item.reviewed_at = Some(now);
        item.updated_at = now;

        let log = self
            .append_log(content_id, decision.into(), reviewer_id, note.clone())
            .await;
        let assignment = self
            .close_assignment(
                content_id,
                reviewer_id,
                decision.assignment_status(),
                note.as_deref(),
                now,
            )
            .await;

        tracing::info!(
            content_id,
            reviewer_id,
            decision = %decision,
            assignment = ?assignment,
            log_written = log.is_some(),
            "Review decision recorded"
        );
        self.dispatcher
            .dispatch(self.notices.decision(&item, decision, note.as_deref()));

        Ok(DecisionOutcome {
            content: item,
            log,
            assignment,
        })
    }

    /// Send content back to its author as a draft.
    ///
    /// Same write order and failure handling as [`decide`](Self::decide).
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the note is blank or too long
    /// - `NotFound`, `AlreadyDecided`, `InvalidState` as for `decide`
    pub async fn request_changes(
        &self,
        content_id: &str,
        reviewer_id: &str,
        note: &str,
    ) -> Result<DecisionOutcome, DecisionError> {
        let note = self.normalize_note(Some(note))?.ok_or_else(|| {
            DecisionError::ValidationError("Describe the changes you need".to_string())
        })?;

        let mut item = self.load_reviewable(content_id, reviewer_id).await?;
        let now = Utc::now();
        if !self
            .content_repo
            .update_status(content_id, ContentStatus::Draft, now)
            .await?
        {
            return Err(DecisionError::NotFound(content_id.to_string()));
        }
        item.status = ContentStatus::Draft;
        item.updated_at = now;

        let log = self
            .append_log(
                content_id,
                ReviewAction::RequestChanges,
                reviewer_id,
                Some(note.clone()),
            )
            .await;
        let assignment = self
            .close_assignment(
                content_id,
                reviewer_id,
                AssignmentStatus::ChangesRequested,
                Some(&note),
                now,
            )
            .await;

        tracing::info!(
            content_id,
            reviewer_id,
            assignment = ?assignment,
            log_written = log.is_some(),
            "Changes requested"
        );
        self.dispatcher
            .dispatch(self.notices.changes_requested(&item, &note));

        Ok(DecisionOutcome {
            content: item,
            log,
            assignment,
        })
    }

    fn normalize_note(&self, note: Option<&str>) -> Result<Option<String>, DecisionError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        match note {
            Some(n) if n.chars().count() > self.config.max_note_len => {
                Err(DecisionError::ValidationError(format!(
                    "Note must be at most {} characters",
                    self.config.max_note_len
                )))
            }
            other => Ok(other.map(str::to_string)),
        }
    }

    async fn load_reviewable(
        &self,
        content_id: &str,
        reviewer_id: &str,
    ) -> Result<ContentItem, DecisionError> {
        let item = self
            .content_repo
            .get_by_id(content_id)
            .await?
            .ok_or_else(|| DecisionError::NotFound(content_id.to_string()))?;
        match item.status {
            status if status.is_terminal() => Err(DecisionError::AlreadyDecided(format!(
                "content is already {}",
                status
            ))),
            ContentStatus::Draft => Err(DecisionError::InvalidState(
                "content has not been submitted".to_string(),
            )),
            _ if item.author_id == reviewer_id => Err(DecisionError::InvalidState(
                "authors cannot review their own content".to_string(),
            )),
            _ => Ok(item),
        }
    }

    async fn append_log(
        &self,
        content_id: &str,
        action: ReviewAction,
        actor_id: &str,
        note: Option<String>,
    ) -> Option<ReviewLog> {
        let log = ReviewLog::new(
            content_id.to_string(),
            action,
            actor_id.to_string(),
            note,
        );
        match self.log_repo.append(&log).await {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::error!(content_id, action = %action, "Failed to append review log: {:#}", e);
                None
            }
        }
    }

    async fn close_assignment(
        &self,
        content_id: &str,
        reviewer_id: &str,
        status: AssignmentStatus,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AssignmentUpdate {
        match self
            .assignment_repo
            .resolve_pending(content_id, reviewer_id, status, note, at)
            .await
        {
            Ok(0) => AssignmentUpdate::NoPendingAssignment,
            Ok(_) => AssignmentUpdate::Updated,
            Err(e) => {
                tracing::error!(content_id, reviewer_id, "Failed to close assignment: {:#}", e);
                AssignmentUpdate::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{migrated_pool, seed_user};
    use crate::db::repositories::{
        SqlxAssignmentRepository, SqlxContentRepository, SqlxReviewLogRepository,
    };
    use crate::models::{AssignmentWithContent, ContentKind, ReviewAssignment, UserRole};
    use crate::services::notification::{testing::drain, Notification, Recipient};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    // ========================================================================
    // Repository wrappers
    // ========================================================================

    /// Counts every call before delegating.
    struct CountingContent {
        inner: Arc<dyn ContentRepository>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentRepository for CountingContent {
        async fn create(&self, item: &ContentItem) -> Result<ContentItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create(item).await
        }
        async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_by_id(id).await
        }
        async fn update_draft(&self, item: &ContentItem) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.update_draft(item).await
        }
        async fn update_status(
            &self,
            id: &str,
            status: ContentStatus,
            at: DateTime<Utc>,
        ) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.update_status(id, status, at).await
        }
        async fn mark_submitted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.mark_submitted(id, at).await
        }
        async fn record_decision(
            &self,
            id: &str,
            status: ContentStatus,
            reviewer_id: &str,
            at: DateTime<Utc>,
        ) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.record_decision(id, status, reviewer_id, at).await
        }
        async fn list_by_author(
            &self,
            author_id: &str,
            status: Option<ContentStatus>,
            limit: i64,
        ) -> Result<Vec<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_by_author(author_id, status, limit).await
        }
        async fn list_all(
            &self,
            status: Option<ContentStatus>,
            limit: i64,
        ) -> Result<Vec<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_all(status, limit).await
        }
    }

    /// Fails every status write.
    struct ReadOnlyContent(Arc<dyn ContentRepository>);

    #[async_trait]
    impl ContentRepository for ReadOnlyContent {
        async fn create(&self, item: &ContentItem) -> Result<ContentItem> {
            self.0.create(item).await
        }
        async fn get_by_id(&self, id: &str) -> Result<Option<ContentItem>> {
            self.0.get_by_id(id).await
        }
        async fn update_draft(&self, _item: &ContentItem) -> Result<bool> {
            bail!("store is read-only")
        }
        async fn update_status(&self, _: &str, _: ContentStatus, _: DateTime<Utc>) -> Result<bool> {
            bail!("store is read-only")
        }
        async fn mark_submitted(&self, _: &str, _: DateTime<Utc>) -> Result<bool> {
            bail!("store is read-only")
        }
        async fn record_decision(
            &self,
            _: &str,
            _: ContentStatus,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<bool> {
            bail!("store is read-only")
        }
        async fn list_by_author(
            &self,
            author_id: &str,
            status: Option<ContentStatus>,
            limit: i64,
        ) -> Result<Vec<ContentItem>> {
            self.0.list_by_author(author_id, status, limit).await
        }
        async fn list_all(
            &self,
            status: Option<ContentStatus>,
            limit: i64,
        ) -> Result<Vec<ContentItem>> {
            self.0.list_all(status, limit).await
        }
    }

    /// Fails `resolve_pending`.
    struct BrokenResolve(Arc<dyn AssignmentRepository>);

    #[async_trait]
    impl AssignmentRepository for BrokenResolve {
        async fn create(&self, a: &ReviewAssignment) -> Result<ReviewAssignment> {
            self.0.create(a).await
        }
        async fn find_pending(&self, c: &str, r: &str) -> Result<Option<ReviewAssignment>> {
            self.0.find_pending(c, r).await
        }
        async fn list_pending(&self, r: &str, limit: i64) -> Result<Vec<AssignmentWithContent>> {
            self.0.list_pending(r, limit).await
        }
        async fn list_by_statuses(
            &self,
            r: &str,
            statuses: &[AssignmentStatus],
            limit: i64,
        ) -> Result<Vec<AssignmentWithContent>> {
            self.0.list_by_statuses(r, statuses, limit).await
        }
        async fn resolve_pending(
            &self,
            _: &str,
            _: &str,
            _: AssignmentStatus,
            _: Option<&str>,
            _: DateTime<Utc>,
        ) -> Result<u64> {
            bail!("connection reset")
        }
        async fn list_by_content(&self, c: &str) -> Result<Vec<ReviewAssignment>> {
            self.0.list_by_content(c).await
        }
    }

    /// Fails `append`.
    struct BrokenLog(Arc<dyn ReviewLogRepository>);

    #[async_trait]
    impl ReviewLogRepository for BrokenLog {
        async fn append(&self, _log: &ReviewLog) -> Result<ReviewLog> {
            bail!("disk full")
        }
        async fn list_by_content(&self, c: &str) -> Result<Vec<ReviewLog>> {
            self.0.list_by_content(c).await
        }
    }

    // ========================================================================
    // Fixture
    // ========================================================================

    struct Fixture {
        content: Arc<dyn ContentRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        logs: Arc<dyn ReviewLogRepository>,
        dispatcher: NotificationDispatcher,
        rx: mpsc::Receiver<Notification>,
    }

    impl Fixture {
        async fn new() -> Self {
            let pool = migrated_pool().await;
            seed_user(&pool, "p1", UserRole::User).await;
            seed_user(&pool, "r1", UserRole::Guru).await;
            seed_user(&pool, "r2", UserRole::Guru).await;
            seed_user(&pool, "g1", UserRole::Guru).await;
            let (dispatcher, rx) = NotificationDispatcher::channel(16);
            Self {
                content: SqlxContentRepository::boxed(pool.clone()),
                assignments: SqlxAssignmentRepository::boxed(pool.clone()),
                logs: SqlxReviewLogRepository::boxed(pool),
                dispatcher,
                rx,
            }
        }

        fn service_with(
            &self,
            content: Arc<dyn ContentRepository>,
            assignments: Arc<dyn AssignmentRepository>,
            logs: Arc<dyn ReviewLogRepository>,
        ) -> DecisionService {
            DecisionService::new(
                content,
                assignments,
                logs,
                self.dispatcher.clone(),
                Notices::new("EMGurus"),
                ReviewConfig::default(),
            )
        }

        fn service(&self) -> DecisionService {
            self.service_with(
                self.content.clone(),
                self.assignments.clone(),
                self.logs.clone(),
            )
        }

        /// Content `id` by p1, under review, with a pending assignment per reviewer.
        async fn under_review(&self, id: &str, reviewers: &[&str]) {
            self.under_review_by("p1", id, reviewers).await;
        }

        async fn under_review_by(&self, author: &str, id: &str, reviewers: &[&str]) {
            let mut item = ContentItem::new_draft(
                ContentKind::BlogPost,
                author.into(),
                "Sepsis six".into(),
                None,
                "body".into(),
                "<p>body</p>".into(),
            );
            item.id = id.to_string();
            item.status = ContentStatus::UnderReview;
            self.content.create(&item).await.unwrap();
            for reviewer in reviewers {
                self.assignments
                    .create(&ReviewAssignment::pending(id.into(), reviewer.to_string()))
                    .await
                    .unwrap();
            }
        }

        async fn status_of(&self, id: &str) -> ContentStatus {
            self.content.get_by_id(id).await.unwrap().unwrap().status
        }

        async fn assignment_of(&self, content_id: &str, reviewer: &str) -> ReviewAssignment {
            self.assignments
                .list_by_content(content_id)
                .await
                .unwrap()
                .into_iter()
                .find(|a| a.reviewer_id == reviewer)
                .unwrap()
        }
    }

    // ========================================================================
    // decide
    // ========================================================================

    #[tokio::test]
    async fn test_publish_scenario() {
        let mut fx = Fixture::new().await;
        fx.under_review("p1-post", &["r1"]).await;

        let outcome = fx
            .service()
            .decide("p1-post", "r1", Decision::Publish, None)
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.assignment, AssignmentUpdate::Updated);
        assert_eq!(outcome.content.status, ContentStatus::Published);
        assert_eq!(outcome.content.reviewed_by.as_deref(), Some("r1"));

        assert_eq!(fx.status_of("p1-post").await, ContentStatus::Published);
        assert_eq!(
            fx.assignment_of("p1-post", "r1").await.status,
            AssignmentStatus::Completed
        );
        let logs = fx.logs.list_by_content("p1-post").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, ReviewAction::Publish);
        assert_eq!(logs[0].actor_id, "r1");

        let sent = drain(&mut fx.rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, Recipient::User("p1".into()));
        assert!(sent[0].subject.contains("published"));
    }

    #[tokio::test]
    async fn test_reject_attaches_trimmed_note() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;

        let outcome = fx
            .service()
            .decide("c1", "r1", Decision::Reject, Some("  Cite the guideline.  "))
            .await
            .unwrap();
        assert_eq!(outcome.content.status, ContentStatus::Rejected);
        assert_eq!(
            outcome.log.unwrap().note.as_deref(),
            Some("Cite the guideline.")
        );

        let assignment = fx.assignment_of("c1", "r1").await;
        assert_eq!(assignment.status, AssignmentStatus::Rejected);
        assert_eq!(assignment.note.as_deref(), Some("Cite the guideline."));
    }

    #[tokio::test]
    async fn test_reject_without_note_touches_no_store() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let counting = Arc::new(CountingContent {
            inner: fx.content.clone(),
            calls: AtomicUsize::new(0),
        });
        let service = fx.service_with(counting.clone(), fx.assignments.clone(), fx.logs.clone());

        for note in [None, Some(""), Some("   \n")] {
            let result = service.decide("c1", "r1", Decision::Reject, note).await;
            assert!(matches!(result, Err(DecisionError::ValidationError(_))));
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.status_of("c1").await, ContentStatus::UnderReview);
        assert!(fx.logs.list_by_content("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_length_limit() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let long = "x".repeat(ReviewConfig::default().max_note_len + 1);

        let result = fx
            .service()
            .decide("c1", "r1", Decision::Publish, Some(&long))
            .await;
        assert!(matches!(result, Err(DecisionError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_second_decision_is_already_decided() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let service = fx.service();

        service.decide("c1", "r1", Decision::Publish, None).await.unwrap();
        let again = service
            .decide("c1", "r1", Decision::Reject, Some("changed my mind"))
            .await;
        assert!(matches!(again, Err(DecisionError::AlreadyDecided(_))));
        assert_eq!(fx.status_of("c1").await, ContentStatus::Published);
        assert_eq!(fx.logs.list_by_content("c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_draft_content() {
        let fx = Fixture::new().await;
        let draft = ContentItem::new_draft(
            ContentKind::ExamQuestion,
            "p1".into(),
            "Stem".into(),
            None,
            "b".into(),
            "<p>b</p>".into(),
        );
        fx.content.create(&draft).await.unwrap();
        let service = fx.service();

        assert!(matches!(
            service.decide("nope", "r1", Decision::Publish, None).await,
            Err(DecisionError::NotFound(_))
        ));
        assert!(matches!(
            service.decide(&draft.id, "r1", Decision::Publish, None).await,
            Err(DecisionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_decision_without_assignment_reports_it() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &[]).await;

        let outcome = fx
            .service()
            .decide("c1", "r1", Decision::Publish, None)
            .await
            .unwrap();
        assert_eq!(outcome.assignment, AssignmentUpdate::NoPendingAssignment);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_authors_cannot_review_their_own_content() {
        let fx = Fixture::new().await;
        fx.under_review_by("g1", "c1", &["g1", "r1"]).await;
        let service = fx.service();

        assert!(matches!(
            service.decide("c1", "g1", Decision::Publish, None).await,
            Err(DecisionError::InvalidState(_))
        ));
        assert!(matches!(
            service.request_changes("c1", "g1", "Self edit").await,
            Err(DecisionError::InvalidState(_))
        ));
        assert_eq!(fx.status_of("c1").await, ContentStatus::UnderReview);
        assert!(fx.logs.list_by_content("c1").await.unwrap().is_empty());

        service.decide("c1", "r1", Decision::Publish, None).await.unwrap();
        assert_eq!(fx.status_of("c1").await, ContentStatus::Published);
    }

    // ========================================================================
    // Partial failure
    // ========================================================================

    #[tokio::test]
    async fn test_content_write_failure_stops_everything() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let service = fx.service_with(
            Arc::new(ReadOnlyContent(fx.content.clone())),
            fx.assignments.clone(),
            fx.logs.clone(),
        );

        let result = service.decide("c1", "r1", Decision::Publish, None).await;
        assert!(matches!(result, Err(DecisionError::InternalError(_))));
        assert!(fx.logs.list_by_content("c1").await.unwrap().is_empty());
        assert_eq!(
            fx.assignment_of("c1", "r1").await.status,
            AssignmentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_assignment_failure_is_reported_and_healed_on_read() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let service = fx.service_with(
            fx.content.clone(),
            Arc::new(BrokenResolve(fx.assignments.clone())),
            fx.logs.clone(),
        );

        let outcome = service
            .decide("c1", "r1", Decision::Publish, None)
            .await
            .unwrap();
        assert_eq!(outcome.assignment, AssignmentUpdate::Failed);
        assert!(outcome.log.is_some());
        assert!(!outcome.is_complete());

        assert_eq!(
            fx.assignment_of("c1", "r1").await.status,
            AssignmentStatus::Pending
        );
        assert!(fx.assignments.list_pending("r1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_still_closes_assignment() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let service = fx.service_with(
            fx.content.clone(),
            fx.assignments.clone(),
            Arc::new(BrokenLog(fx.logs.clone())),
        );

        let outcome = service
            .decide("c1", "r1", Decision::Reject, Some("Out of date"))
            .await
            .unwrap();
        assert!(outcome.log.is_none());
        assert_eq!(outcome.assignment, AssignmentUpdate::Updated);
        assert_eq!(fx.status_of("c1").await, ContentStatus::Rejected);
    }

    #[tokio::test]
    async fn test_losing_reviewer_assignment_stays_pending_but_hidden() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1", "r2"]).await;
        let service = fx.service();

        service.decide("c1", "r1", Decision::Publish, None).await.unwrap();
        assert!(matches!(
            service
                .decide("c1", "r2", Decision::Reject, Some("late"))
                .await,
            Err(DecisionError::AlreadyDecided(_))
        ));

        assert_eq!(
            fx.assignment_of("c1", "r2").await.status,
            AssignmentStatus::Pending
        );
        assert!(fx.assignments.list_pending("r2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins_on_content_status() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1", "r2"]).await;

        // r2 read the item before r1 wrote; its write lands afterwards
        fx.service()
            .decide("c1", "r1", Decision::Publish, None)
            .await
            .unwrap();
        fx.content
            .record_decision("c1", ContentStatus::Rejected, "r2", Utc::now())
            .await
            .unwrap();

        let item = fx.content.get_by_id("c1").await.unwrap().unwrap();
        assert_eq!(item.status, ContentStatus::Rejected);
        assert_eq!(item.reviewed_by.as_deref(), Some("r2"));
    }

    // ========================================================================
    // request_changes
    // ========================================================================

    #[tokio::test]
    async fn test_request_changes_returns_to_draft() {
        let mut fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;

        let outcome = fx
            .service()
            .request_changes("c1", "r1", "Add references")
            .await
            .unwrap();
        assert_eq!(outcome.content.status, ContentStatus::Draft);
        assert_eq!(outcome.assignment, AssignmentUpdate::Updated);
        assert_eq!(outcome.log.unwrap().action, ReviewAction::RequestChanges);

        let assignment = fx.assignment_of("c1", "r1").await;
        assert_eq!(assignment.status, AssignmentStatus::ChangesRequested);
        assert_eq!(assignment.note.as_deref(), Some("Add references"));

        let sent = drain(&mut fx.rx);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Changes requested"));
    }

    #[tokio::test]
    async fn test_request_changes_hides_draft_from_other_reviewers() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1", "r2"]).await;
        let service = fx.service();

        service
            .request_changes("c1", "r1", "Add references")
            .await
            .unwrap();
        assert!(fx.assignments.list_pending("r2", 10).await.unwrap().is_empty());
        assert_eq!(
            fx.assignment_of("c1", "r2").await.status,
            AssignmentStatus::Pending
        );

        // After resubmission r2's open assignment is live again.
        fx.content.mark_submitted("c1", Utc::now()).await.unwrap();
        let pending = fx.assignments.list_pending("r2", 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content_status, ContentStatus::Submitted);

        let outcome = service
            .decide("c1", "r2", Decision::Publish, None)
            .await
            .unwrap();
        assert_eq!(outcome.assignment, AssignmentUpdate::Updated);
        assert_eq!(fx.status_of("c1").await, ContentStatus::Published);
    }

    #[tokio::test]
    async fn test_request_changes_requires_note_and_open_content() {
        let fx = Fixture::new().await;
        fx.under_review("c1", &["r1"]).await;
        let service = fx.service();

        assert!(matches!(
            service.request_changes("c1", "r1", "  ").await,
            Err(DecisionError::ValidationError(_))
        ));
        service.decide("c1", "r1", Decision::Publish, None).await.unwrap();
        assert!(matches!(
            service.request_changes("c1", "r1", "too late").await,
            Err(DecisionError::AlreadyDecided(_))
        ));
    }
}
