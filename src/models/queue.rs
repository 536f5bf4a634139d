//! Queue view model
//!
//! Read-only projections rendered per audience. Each row lists the actions
//! its audience may take; an empty view carries an explicit message.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AssignmentStatus, ContentKind, ContentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAudience {
    Author,
    ReviewerPending,
    RejectedByMe,
    Admin,
}

impl QueueAudience {
    pub fn title(&self) -> &'static str {
        match self {
            QueueAudience::Author => "My submissions",
            QueueAudience::ReviewerPending => "Awaiting my review",
            QueueAudience::RejectedByMe => "Rejected by me",
            QueueAudience::Admin => "All content",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            QueueAudience::Author => "You have not written anything yet.",
            QueueAudience::ReviewerPending => "Nothing is waiting for your review.",
            QueueAudience::RejectedByMe => "You have not rejected or returned any content.",
            QueueAudience::Admin => "No content matches this filter.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Edit,
    Submit,
    Publish,
    Reject,
    RequestChanges,
    Assign,
}

/// One line of a queue view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueRow {
    pub content_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    pub kind: ContentKind,
    pub title: String,
    pub category: Option<String>,
    pub author_id: String,
    pub content_status: ContentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_status: Option<AssignmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Assignment time for reviewer views, last update otherwise
    pub timestamp: DateTime<Utc>,
    pub actions: Vec<QueueAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueView {
    pub audience: QueueAudience,
    pub title: String,
    pub rows: Vec<QueueRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

impl QueueView {
    /// Assemble a view, setting the empty-state message only when there are
    /// no rows.
    pub fn new(audience: QueueAudience, rows: Vec<QueueRow>) -> Self {
        let empty_message = rows
            .is_empty()
            .then(|| audience.empty_message().to_string());
        Self {
            audience,
            title: audience.title().to_string(),
            rows,
            empty_message,
        }
    }
}
