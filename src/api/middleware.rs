//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and service error mappings
//! - Session resolution (`require_auth`) and role gates

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, ReviewConfig};
use crate::db::repositories::{
    SqlxAssignmentRepository, SqlxContentRepository, SqlxReviewLogRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::SessionContext;
use crate::services::{
    AssignmentService, AssignmentServiceError, ContentService, ContentServiceError,
    DecisionError, DecisionService, MarkdownRenderer, Notices, NotificationDispatcher,
    QueueService, SessionService, SessionServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub content_service: Arc<ContentService>,
    pub assignment_service: Arc<AssignmentService>,
    pub decision_service: Arc<DecisionService>,
    pub queue_service: Arc<QueueService>,
    pub review_config: ReviewConfig,
}

impl AppState {
    /// Wire repositories and services over one pool.
    pub fn new(pool: DynDatabasePool, config: &Config, dispatcher: NotificationDispatcher) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let assignment_repo = SqlxAssignmentRepository::boxed(pool.clone());
        let log_repo = SqlxReviewLogRepository::boxed(pool);
        let notices = Notices::new(config.notification.site_name.clone());

        Self {
            session_service: Arc::new(SessionService::new(
                user_repo.clone(),
                session_repo,
                &config.auth,
            )),
            content_service: Arc::new(ContentService::new(
                content_repo.clone(),
                log_repo.clone(),
                MarkdownRenderer::new(),
                dispatcher.clone(),
                notices.clone(),
            )),
            assignment_service: Arc::new(AssignmentService::new(
                assignment_repo.clone(),
                content_repo.clone(),
                user_repo,
                log_repo.clone(),
                dispatcher.clone(),
                notices.clone(),
                config.review.clone(),
            )),
            decision_service: Arc::new(DecisionService::new(
                content_repo.clone(),
                assignment_repo.clone(),
                log_repo,
                dispatcher,
                notices,
                config.review.clone(),
            )),
            queue_service: Arc::new(QueueService::new(
                content_repo,
                assignment_repo,
                config.review.clone(),
            )),
            review_config: config.review.clone(),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause and returns an opaque internal error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(_) => Self::not_found(err.to_string()),
            ContentServiceError::Forbidden(msg) => Self::forbidden(msg),
            ContentServiceError::InvalidState(msg) => Self::conflict(msg),
            ContentServiceError::ValidationError(msg) => Self::validation_error(msg),
            ContentServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<AssignmentServiceError> for ApiError {
    fn from(err: AssignmentServiceError) -> Self {
        match err {
            AssignmentServiceError::ContentNotFound(_)
            | AssignmentServiceError::ReviewerNotFound(_) => Self::not_found(err.to_string()),
            AssignmentServiceError::InvalidReviewer(msg)
            | AssignmentServiceError::ValidationError(msg) => Self::validation_error(msg),
            AssignmentServiceError::InvalidState(msg) | AssignmentServiceError::Conflict(msg) => {
                Self::conflict(msg)
            }
            AssignmentServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<DecisionError> for ApiError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::ValidationError(msg) => Self::validation_error(msg),
            DecisionError::NotFound(_) => Self::not_found(err.to_string()),
            DecisionError::AlreadyDecided(msg) => Self::with_details(
                "CONFLICT",
                msg,
                serde_json::json!({ "reason": "already_decided" }),
            ),
            DecisionError::InvalidState(msg) => Self::conflict(msg),
            DecisionError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<SessionServiceError> for ApiError {
    fn from(err: SessionServiceError) -> Self {
        match err {
            SessionServiceError::SignInDisabled => Self::forbidden(err.to_string()),
            SessionServiceError::InvalidAssertion(_) | SessionServiceError::AssertionExpired => {
                Self::unauthorized(err.to_string())
            }
            SessionServiceError::ValidationError(msg) => Self::validation_error(msg),
            SessionServiceError::UserNotFound(_) => Self::not_found(err.to_string()),
            SessionServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

/// Extract the session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
///
/// Resolves the token into a [`SessionContext`] and stores it in the request
/// extensions for handlers and the role gates.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let context = state
        .session_service
        .resolve(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Guru authorization middleware (admins pass too)
pub async fn require_guru(request: Request, next: Next) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<SessionContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !context.is_guru() {
        return Err(ApiError::forbidden("Guru privileges required"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<SessionContext>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !context.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
