//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Session endpoints (sign-in from an identity assertion, sign-out)
//! - Author content endpoints and the author queue
//! - Reviewer queues and decisions (guru or admin)
//! - Admin queue, assignment, audit logs and roles

pub mod admin;
pub mod common;
pub mod content;
pub mod middleware;
pub mod reviews;
pub mod session;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let reviewer_routes = Router::new()
        .nest("/reviews", reviews::router())
        .route_layer(axum_middleware::from_fn(middleware::require_guru))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .nest("/session", session::protected_router())
        .nest("/content", content::router())
        .route("/queues/mine", get(content::my_queue))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/session", session::public_router())
        .merge(admin_routes)
        .merge(reviewer_routes)
        .merge(protected_routes)
}

/// Build the complete router with CORS and request tracing
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}
