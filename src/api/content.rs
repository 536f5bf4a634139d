//! Content API endpoints (authors)
//!
//! - POST /api/v1/content - Create a draft
//! - GET /api/v1/content/{id} - Get an item visible to the caller
//! - PUT /api/v1/content/{id} - Edit an own draft
//! - POST /api/v1/content/{id}/submit - Submit an own draft for review
//! - GET /api/v1/queues/mine - The caller's author queue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::common::ContentListQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    ContentItem, CreateContentInput, QueueView, SessionContext, UpdateContentInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_content))
        .route("/{id}", get(get_content).put(update_content))
        .route("/{id}/submit", post(submit_content))
}

/// POST /api/v1/content
async fn create_content(
    State(state): State<AppState>,
    session: SessionContext,
    Json(input): Json<CreateContentInput>,
) -> Result<(StatusCode, Json<ContentItem>), ApiError> {
    let item = state
        .content_service
        .create_draft(session.user_id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/content/{id}
async fn get_content(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    Ok(Json(state.content_service.get_visible(&session, &id).await?))
}

/// PUT /api/v1/content/{id}
async fn update_content(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<String>,
    Json(input): Json<UpdateContentInput>,
) -> Result<Json<ContentItem>, ApiError> {
    let item = state
        .content_service
        .update_draft(session.user_id(), &id, input)
        .await?;
    Ok(Json(item))
}

/// POST /api/v1/content/{id}/submit
async fn submit_content(
    State(state): State<AppState>,
    session: SessionContext,
    Path(id): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    Ok(Json(state.content_service.submit(session.user_id(), &id).await?))
}

/// GET /api/v1/queues/mine
pub async fn my_queue(
    State(state): State<AppState>,
    session: SessionContext,
    Query(query): Query<ContentListQuery>,
) -> Result<Json<QueueView>, ApiError> {
    let view = state
        .queue_service
        .author_queue(session.user_id(), query.status, query.limit)
        .await?;
    Ok(Json(view))
}
