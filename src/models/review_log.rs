//! Review log model (append-only audit trail)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub id: String,
    pub content_id: String,
    pub action: ReviewAction,
    pub actor_id: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewLog {
    pub fn new(
        content_id: String,
        action: ReviewAction,
        actor_id: String,
        note: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id,
            action,
            actor_id,
            note,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Submit,
    Assign,
    Publish,
    Reject,
    RequestChanges,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Submit => "submit",
            ReviewAction::Assign => "assign",
            ReviewAction::Publish => "publish",
            ReviewAction::Reject => "reject",
            ReviewAction::RequestChanges => "request_changes",
        }
    }
}

impl From<super::Decision> for ReviewAction {
    fn from(decision: super::Decision) -> Self {
        match decision {
            super::Decision::Publish => ReviewAction::Publish,
            super::Decision::Reject => ReviewAction::Reject,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(ReviewAction::Submit),
            "assign" => Ok(ReviewAction::Assign),
            "publish" => Ok(ReviewAction::Publish),
            "reject" => Ok(ReviewAction::Reject),
            "request_changes" => Ok(ReviewAction::RequestChanges),
            _ => Err(anyhow::anyhow!("Invalid review action: {}", s)),
        }
    }
}
