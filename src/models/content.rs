//! Content model
//!
//! This module provides:
//! - `ContentItem`, a blog post or exam question moving through review
//! - `ContentKind` and `ContentStatus`
//! - Input types for creating and updating drafts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reviewable piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub author_id: String,
    /// Post title or question stem
    pub title: String,
    /// Blog category or exam type
    pub category: Option<String>,
    /// Markdown source
    pub body: String,
    /// Rendered HTML
    pub body_html: String,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    /// Create a new draft with a generated id
    pub fn new_draft(
        kind: ContentKind,
        author_id: String,
        title: String,
        category: Option<String>,
        body: String,
        body_html: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            author_id,
            title,
            category,
            body,
            body_html,
            status: ContentStatus::Draft,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    BlogPost,
    ExamQuestion,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::BlogPost => "blog_post",
            ContentKind::ExamQuestion => "exam_question",
        }
    }

    /// Human label used in notices and queue titles
    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::BlogPost => "blog post",
            ContentKind::ExamQuestion => "exam question",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blog_post" => Ok(ContentKind::BlogPost),
            "exam_question" => Ok(ContentKind::ExamQuestion),
            _ => Err(anyhow::anyhow!("Invalid content kind: {}", s)),
        }
    }
}

/// Lifecycle of a content item.
///
/// `draft → submitted → under_review → published | rejected`. A reviewer
/// may also send submitted or under-review content back to `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Published,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Submitted => "submitted",
            ContentStatus::UnderReview => "under_review",
            ContentStatus::Published => "published",
            ContentStatus::Rejected => "rejected",
        }
    }

    /// Published and rejected are final; no further decisions apply.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentStatus::Published | ContentStatus::Rejected)
    }

    pub fn awaits_review(&self) -> bool {
        matches!(self, ContentStatus::Submitted | ContentStatus::UnderReview)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "submitted" => Ok(ContentStatus::Submitted),
            "under_review" => Ok(ContentStatus::UnderReview),
            "published" => Ok(ContentStatus::Published),
            "rejected" => Ok(ContentStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid content status: {}", s)),
        }
    }
}

/// Input for creating a draft
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentInput {
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub body: String,
}

/// Input for editing a draft. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContentInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal_and_awaiting() {
        assert!(ContentStatus::Published.is_terminal());
        assert!(ContentStatus::Rejected.is_terminal());
        assert!(!ContentStatus::UnderReview.is_terminal());
        assert!(ContentStatus::Submitted.awaits_review());
        assert!(ContentStatus::UnderReview.awaits_review());
        assert!(!ContentStatus::Draft.awaits_review());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ContentStatus::UnderReview).unwrap(),
            serde_json::json!("under_review")
        );
        assert_eq!(
            "under_review".parse::<ContentStatus>().unwrap(),
            ContentStatus::UnderReview
        );
        assert!("pending".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_kind_wire_names() {
        let kind: ContentKind = serde_json::from_str("\"exam_question\"").unwrap();
        assert_eq!(kind, ContentKind::ExamQuestion);
        assert_eq!(kind.as_str().parse::<ContentKind>().unwrap(), kind);
    }

    #[test]
    fn test_new_draft() {
        let item = ContentItem::new_draft(
            ContentKind::BlogPost,
            "author".into(),
            "Sepsis bundles".into(),
            None,
            "body".into(),
            "<p>body</p>".into(),
        );
        assert_eq!(item.status, ContentStatus::Draft);
        assert!(item.submitted_at.is_none());
        assert_eq!(item.created_at, item.updated_at);
        assert!(uuid::Uuid::parse_str(&item.id).is_ok());
    }
}
