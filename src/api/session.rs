//! Session API endpoints
//!
//! - POST /api/v1/session - Exchange an identity assertion for a session
//! - GET /api/v1/session - Current session context
//! - DELETE /api/v1/session - Sign out

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::{extract_session_token, ApiError, AppState};
use crate::models::SessionContext;
use crate::services::IdentityAssertion;

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub session: SessionContext,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(sign_in))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/", axum::routing::get(current).delete(sign_out))
}

/// POST /api/v1/session
///
/// Sets an HttpOnly `session` cookie and also returns the token for bearer use.
async fn sign_in(
    State(state): State<AppState>,
    Json(assertion): Json<IdentityAssertion>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state
        .session_service
        .sign_in_with_assertion(&assertion)
        .await?;

    let max_age = (signed_in.context.expires_at - Utc::now())
        .num_seconds()
        .max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        signed_in.token, max_age
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );

    Ok((
        headers,
        Json(SignInResponse {
            token: signed_in.token,
            session: signed_in.context,
        }),
    ))
}

/// GET /api/v1/session
async fn current(context: SessionContext) -> Json<SessionContext> {
    Json(context)
}

/// DELETE /api/v1/session
async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.session_service.sign_out(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}
