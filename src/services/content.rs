//! Content authoring service
//!
//! Authors write drafts, edit them, and submit them for review:
//! - `create_draft` / `update_draft` validate and render markdown
//! - `submit` moves a draft to `submitted`, logs it, and tells the admins
//! - `get_visible` / `logs` serve the read side

use crate::db::repositories::{ContentRepository, ReviewLogRepository};
use crate::models::{
    ContentItem, ContentStatus, CreateContentInput, ReviewAction, ReviewLog, SessionContext,
    UpdateContentInput,
};
use crate::services::markdown::MarkdownRenderer;
use crate::services::notification::{NotificationDispatcher, Notices};
use chrono::Utc;
use std::sync::Arc;

const MAX_TITLE_LEN: usize = 500;
const MAX_CATEGORY_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ContentServiceError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The item is not in a status that allows the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContentService {
    content_repo: Arc<dyn ContentRepository>,
    log_repo: Arc<dyn ReviewLogRepository>,
    renderer: MarkdownRenderer,
    dispatcher: NotificationDispatcher,
    notices: Notices,
}

impl ContentService {
    pub fn new(
        content_repo: Arc<dyn ContentRepository>,
        log_repo: Arc<dyn ReviewLogRepository>,
        renderer: MarkdownRenderer,
        dispatcher: NotificationDispatcher,
        notices: Notices,
    ) -> Self {
        Self {
            content_repo,
            log_repo,
            renderer,
            dispatcher,
            notices,
        }
    }

    /// Create a draft owned by `author_id`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if title or body is blank or a field is too long
    pub async fn create_draft(
        &self,
        author_id: &str,
        input: CreateContentInput,
    ) -> Result<ContentItem, ContentServiceError> {
        let title = validate_title(&input.title)?;
        let body = validate_body(&input.body)?;
        let category = normalize_category(input.category.as_deref())?;

        let body_html = self.renderer.render(&body);
        let item = ContentItem::new_draft(
            input.kind,
            author_id.to_string(),
            title,
            category,
            body,
            body_html,
        );
        let item = self.content_repo.create(&item).await?;

        tracing::info!(content_id = %item.id, author_id, kind = %item.kind, "Draft created");
        Ok(item)
    }

    /// Edit a draft. Only the author may edit, and only while it is a draft.
    pub async fn update_draft(
        &self,
        author_id: &str,
        id: &str,
        input: UpdateContentInput,
    ) -> Result<ContentItem, ContentServiceError> {
        let mut item = self.load_owned(author_id, id).await?;
        if item.status != ContentStatus::Draft {
            return Err(ContentServiceError::InvalidState(format!(
                "only drafts can be edited (status is {})",
                item.status
            )));
        }

        if let Some(title) = input.title.as_deref() {
            item.title = validate_title(title)?;
        }
        if let Some(category) = input.category.as_deref() {
            item.category = normalize_category(Some(category))?;
        }
        if let Some(body) = input.body.as_deref() {
            item.body = validate_body(body)?;
            item.body_html = self.renderer.render(&item.body);
        }
        item.updated_at = Utc::now();

        if !self.content_repo.update_draft(&item).await? {
            return Err(ContentServiceError::NotFound(id.to_string()));
        }
        Ok(item)
    }

    /// Submit a draft for review.
    ///
    /// The status change is the operation; the `submit` log entry and the
    /// admin notice follow it and their failures are only logged.
    pub async fn submit(&self, author_id: &str, id: &str) -> Result<ContentItem, ContentServiceError> {
        let mut item = self.load_owned(author_id, id).await?;
        if item.status != ContentStatus::Draft {
            return Err(ContentServiceError::InvalidState(format!(
                "only drafts can be submitted (status is {})",
                item.status
            )));
        }

        let now = Utc::now();
        if !self.content_repo.mark_submitted(id, now).await? {
            return Err(ContentServiceError::NotFound(id.to_string()));
        }
        item.status = ContentStatus::Submitted;
        item.submitted_at = Some(now);
        item.updated_at = now;

        let log = ReviewLog::new(id.to_string(), ReviewAction::Submit, author_id.to_string(), None);
        if let Err(e) = self.log_repo.append(&log).await {
            tracing::error!(content_id = id, "Failed to append submit log: {:#}", e);
        }

        self.dispatcher.dispatch(self.notices.submitted(&item));
        tracing::info!(content_id = id, author_id, "Content submitted for review");
        Ok(item)
    }

    /// Fetch an item if the viewer may see it: its author, any reviewer or
    /// admin, or anyone once it is published.
    pub async fn get_visible(
        &self,
        viewer: &SessionContext,
        id: &str,
    ) -> Result<ContentItem, ContentServiceError> {
        let item = self
            .content_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::NotFound(id.to_string()))?;

        let visible = item.author_id == viewer.user_id()
            || viewer.is_guru()
            || item.status == ContentStatus::Published;
        if !visible {
            return Err(ContentServiceError::NotFound(id.to_string()));
        }
        Ok(item)
    }

    /// Audit trail for an item, oldest first.
    pub async fn logs(&self, id: &str) -> Result<Vec<ReviewLog>, ContentServiceError> {
        if self.content_repo.get_by_id(id).await?.is_none() {
            return Err(ContentServiceError::NotFound(id.to_string()));
        }
        Ok(self.log_repo.list_by_content(id).await?)
    }

    async fn load_owned(&self, author_id: &str, id: &str) -> Result<ContentItem, ContentServiceError> {
        let item = self
            .content_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::NotFound(id.to_string()))?;
        if item.author_id != author_id {
            return Err(ContentServiceError::Forbidden(
                "only the author can change this content".to_string(),
            ));
        }
        Ok(item)
    }
}

fn validate_title(title: &str) -> Result<String, ContentServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ContentServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_body(body: &str) -> Result<String, ContentServiceError> {
    if body.trim().is_empty() {
        return Err(ContentServiceError::ValidationError(
            "Body cannot be empty".to_string(),
        ));
    }
    Ok(body.to_string())
}

fn normalize_category(category: Option<&str>) -> Result<Option<String>, ContentServiceError> {
    match category.map(str::trim) {
        None | Some("") => Ok(None),
        Some(c) if c.chars().count() > MAX_CATEGORY_LEN => Err(ContentServiceError::ValidationError(
            format!("Category cannot exceed {} characters", MAX_CATEGORY_LEN),
        )),
        Some(c) => Ok(Some(c.to_string())),
    }
}
