//! Review assignment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ContentKind, ContentStatus};

/// Links a content item to the guru asked to review it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAssignment {
    pub id: String,
    pub content_id: String,
    pub reviewer_id: String,
    pub status: AssignmentStatus,
    /// Reviewer note recorded with the outcome
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewAssignment {
    /// New pending assignment with a generated id
    pub fn pending(content_id: String, reviewer_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id,
            reviewer_id,
            status: AssignmentStatus::Pending,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Completed,
    Rejected,
    ChangesRequested,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Rejected => "rejected",
            AssignmentStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Rejected)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "completed" => Ok(AssignmentStatus::Completed),
            "rejected" => Ok(AssignmentStatus::Rejected),
            "changes_requested" => Ok(AssignmentStatus::ChangesRequested),
            _ => Err(anyhow::anyhow!("Invalid assignment status: {}", s)),
        }
    }
}

/// An assignment together with the content fields a reviewer sees in a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentWithContent {
    pub assignment: ReviewAssignment,
    pub kind: ContentKind,
    pub title: String,
    pub category: Option<String>,
    pub content_status: ContentStatus,
    pub author_id: String,
}

/// Reviewer verdict on submitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Publish,
    Reject,
}

impl Decision {
    pub fn content_status(&self) -> ContentStatus {
        match self {
            Decision::Publish => ContentStatus::Published,
            Decision::Reject => ContentStatus::Rejected,
        }
    }

    pub fn assignment_status(&self) -> AssignmentStatus {
        match self {
            Decision::Publish => AssignmentStatus::Completed,
            Decision::Reject => AssignmentStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Publish => "publish",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
