//! Common API utilities and shared types

use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::{AssignmentStatus, ContentStatus};

// ============================================================================
// Query Types
// ============================================================================

/// `?limit=` only
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// `?status=draft&limit=` for content listings
#[derive(Debug, Default, Deserialize)]
pub struct ContentListQuery {
    pub status: Option<ContentStatus>,
    pub limit: Option<i64>,
}

/// `?status=rejected,changes_requested&limit=` for decided assignments
#[derive(Debug, Default, Deserialize)]
pub struct DecidedQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl DecidedQuery {
    /// Parse the comma-separated status filter; empty means no filter.
    pub fn statuses(&self) -> Result<Option<Vec<AssignmentStatus>>, ApiError> {
        let raw = match self.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        raw.split(',')
            .map(|s| {
                s.trim()
                    .parse::<AssignmentStatus>()
                    .map_err(|e| ApiError::validation_error(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decided_query_parses_list() {
        let q = DecidedQuery {
            status: Some("rejected, changes_requested".into()),
            limit: None,
        };
        assert_eq!(
            q.statuses().unwrap(),
            Some(vec![AssignmentStatus::Rejected, AssignmentStatus::ChangesRequested])
        );
    }

    #[test]
    fn test_decided_query_empty_and_invalid() {
        assert_eq!(DecidedQuery::default().statuses().unwrap(), None);
        let blank = DecidedQuery {
            status: Some("  ".into()),
            limit: None,
        };
        assert_eq!(blank.statuses().unwrap(), None);

        let bad = DecidedQuery {
            status: Some("rejected,archived".into()),
            limit: None,
        };
        assert_eq!(bad.statuses().unwrap_err().error.code, "VALIDATION_ERROR");
    }
}
