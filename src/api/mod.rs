//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Attraction endpoints (list, detail, submit, edit, delete, reviews, map)
//! - Auth endpoints (register, login, logout, me)
//! - Admin endpoints (moderation)
//! - Health check
//!
//! Every request passes the `Host` guard; sessions are resolved once per
//! request and handlers pick the user up through the auth extractors.

pub mod admin;
pub mod attractions;
pub mod auth;
pub mod common;
pub mod health;
pub mod middleware;
pub mod responses;

#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    response::Redirect,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the main API router
pub fn build_api_router() -> Router<AppState> {
    // Staff routes
    let admin_routes =
        admin::router().route_layer(axum_middleware::from_fn(middleware::require_staff));

    Router::new()
        .nest("/attractions", attractions::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin_routes)
        .nest("/health", health::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let server = state.server_config.clone();
    let upload = state.upload_config.clone();

    let mut router = Router::new()
        .route("/", get(|| async { Redirect::to("/api/v1/attractions") }))
        .nest("/api/v1", build_api_router());

    // Uploaded photos are served by the front-end server in production
    if server.debug {
        router = router.nest_service("/media", ServeDir::new(&upload.media_root));
    }

    let mut router = router
        .layer(DefaultBodyLimit::max(upload.max_request_size))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_session,
        ))
        .layer(CompressionLayer::new());

    if let Some(origin) = server.cors_origin.as_deref() {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                    .allow_credentials(true);
                router = router.layer(cors);
            }
            Err(e) => tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e),
        }
    }

    router
        .layer(axum_middleware::from_fn_with_state(server, middleware::host_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
