//! Admin API endpoints
//!
//! - GET /api/v1/admin/queue - All content, with assign actions
//! - POST /api/v1/admin/assignments - Assign content to a guru
//! - GET /api/v1/admin/content/{id}/logs - Review audit trail
//! - PUT /api/v1/admin/users/{id}/role - Change a user's role

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ContentListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{QueueView, ReviewAssignment, ReviewLog, SessionContext, User, UserRole};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub content_id: String,
    pub reviewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(admin_queue))
        .route("/assignments", post(assign))
        .route("/content/{id}/logs", get(content_logs))
        .route("/users/{id}/role", put(update_role))
}

/// GET /api/v1/admin/queue
async fn admin_queue(
    State(state): State<AppState>,
    Query(query): Query<ContentListQuery>,
) -> Result<Json<QueueView>, ApiError> {
    let view = state
        .queue_service
        .admin_queue(query.status, query.limit)
        .await?;
    Ok(Json(view))
}

/// POST /api/v1/admin/assignments
async fn assign(
    State(state): State<AppState>,
    session: SessionContext,
    Json(body): Json<AssignRequest>,
) -> Result<(StatusCode, Json<ReviewAssignment>), ApiError> {
    let assignment = state
        .assignment_service
        .assign(&body.content_id, &body.reviewer_id, session.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// GET /api/v1/admin/content/{id}/logs
async fn content_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReviewLog>>, ApiError> {
    Ok(Json(state.content_service.logs(&id).await?))
}

/// PUT /api/v1/admin/users/{id}/role
async fn update_role(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<String>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    if id == session.user_id() && body.role != UserRole::Admin {
        return Err(ApiError::validation_error("Admins cannot demote themselves"));
    }
    Ok(Json(state.session_service.update_role(&id, body.role).await?))
}
