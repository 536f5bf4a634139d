//! Reviewer API endpoints (guru or admin)
//!
//! - GET /api/v1/reviews/pending - Pending queue, oldest first
//! - GET /api/v1/reviews/decided - Decided assignments, newest first
//! - GET /api/v1/reviews/rejected - Read-only "rejected by me" view
//! - POST /api/v1/reviews/{content_id}/decision - Publish or reject
//! - POST /api/v1/reviews/{content_id}/request-changes - Send back to the author
//!
//! Decisions answer 200 even when a follow-up write failed; the outcome body
//! says which parts landed.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{DecidedQuery, LimitQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{AssignmentWithContent, Decision, QueueView, SessionContext};
use crate::services::DecisionOutcome;

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestChangesRequest {
    pub note: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(pending))
        .route("/decided", get(decided))
        .route("/rejected", get(rejected))
        .route("/{content_id}/decision", post(decide))
        .route("/{content_id}/request-changes", post(request_changes))
}

/// GET /api/v1/reviews/pending
async fn pending(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<LimitQuery>,
) -> Result<Json<QueueView>, ApiError> {
    let view = state
        .queue_service
        .pending_queue(session.user_id(), query.limit)
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/reviews/decided
async fn decided(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<DecidedQuery>,
) -> Result<Json<Vec<AssignmentWithContent>>, ApiError> {
    let statuses = query.statuses()?;
    let rows = state
        .assignment_service
        .list_decided(session.user_id(), statuses.as_deref(), query.limit)
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/reviews/rejected
async fn rejected(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<LimitQuery>,
) -> Result<Json<QueueView>, ApiError> {
    let view = state
        .queue_service
        .rejected_by_me(session.user_id(), query.limit)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/reviews/{content_id}/decision
async fn decide(
    State(state): State<AppState>,
    session: SessionContext,
    Path(content_id): Path<String>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<DecisionOutcome>, ApiError> {
    let outcome = state
        .decision_service
        .decide(
            &content_id,
            session.user_id(),
            body.decision,
            body.note.as_deref(),
        )
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/reviews/{content_id}/request-changes
async fn request_changes(
    State(state): State<AppState>,
    session: SessionContext,
    Path(content_id): Path<String>,
    Json(body): Json<RequestChangesRequest>,
) -> Result<Json<DecisionOutcome>, ApiError> {
    let outcome = state
        .decision_service
        .request_changes(&content_id, session.user_id(), &body.note)
        .await?;
    Ok(Json(outcome))
}
