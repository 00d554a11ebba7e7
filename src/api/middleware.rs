//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type and its status mapping
//! - Session resolution (Bearer header or `session` cookie)
//! - Authentication extractors and the staff check
//! - The `Host` header guard

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, ServerConfig, UploadConfig};
use crate::db::repositories::{
    SqlxAttractionRepository, SqlxReviewRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, Viewer};
use crate::services::attraction::{AttractionService, AttractionServiceError};
use crate::services::media::MediaStore;
use crate::services::review::{ReviewService, ReviewServiceError};
use crate::services::session_token::SessionSigner;
use crate::services::user::{UserService, UserServiceError};
use crate::services::validation::FormErrors;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub attraction_service: Arc<AttractionService>,
    pub review_service: Arc<ReviewService>,
    pub server_config: Arc<ServerConfig>,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    /// Wire repositories and services on top of `pool`
    pub fn from_config(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let attraction_repo = SqlxAttractionRepository::boxed(pool.clone());
        let review_repo = SqlxReviewRepository::boxed(pool.clone());

        let signer = SessionSigner::new(config.secret_key())?;
        let user_service = Arc::new(UserService::new(user_repo, session_repo, signer));
        let attraction_service = Arc::new(AttractionService::new(
            attraction_repo,
            review_repo.clone(),
            MediaStore::new(config.upload.media_root.clone()),
            config.upload.clone(),
        ));
        let review_service = Arc::new(ReviewService::new(review_repo, attraction_service.clone()));

        Ok(Self {
            pool,
            user_service,
            attraction_service,
            review_service,
            server_config: Arc::new(config.server.clone()),
            upload_config: Arc::new(config.upload.clone()),
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The session user, if any. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn viewer(&self) -> Viewer {
        self.0.as_ref().map(User::viewer).unwrap_or_default()
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

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
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

    /// Field errors; `details` maps each field to its messages
    pub fn invalid_form(errors: &FormErrors) -> Self {
        tracing::debug!("Form rejected on fields {:?}", errors.field_names());
        let details = serde_json::to_value(errors).unwrap_or_default();
        Self::with_details("VALIDATION_ERROR", "Please correct the errors below.", details)
    }

    /// Logs `err` and returns a generic 500
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
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

impl From<AttractionServiceError> for ApiError {
    fn from(err: AttractionServiceError) -> Self {
        match err {
            AttractionServiceError::NotFound => ApiError::not_found("Attraction not found"),
            AttractionServiceError::PermissionDenied(msg) => ApiError::forbidden(msg),
            AttractionServiceError::ValidationError(errors) => ApiError::invalid_form(&errors),
            AttractionServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(err: ReviewServiceError) -> Self {
        match err {
            ReviewServiceError::NotFound => ApiError::not_found("Attraction not found"),
            ReviewServiceError::ValidationError(errors) => ApiError::invalid_form(&errors),
            ReviewServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(errors) => ApiError::invalid_form(&errors),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Extract session token from request headers
pub fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some(token) = cookie.trim().strip_prefix("session=") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Resolve the session once per request.
///
/// A valid session puts an [`AuthenticatedUser`] into the request
/// extensions; anything else leaves the request anonymous.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.authenticate(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => tracing::debug!("Ignoring invalid or expired session token"),
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Staff authorization middleware
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_staff() {
        return Err(ApiError::forbidden("Staff privileges required"));
    }

    Ok(next.run(request).await)
}

/// Reject requests whose `Host` header is not in `allowed_hosts`
pub async fn host_guard(
    State(server): State<Arc<ServerConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();

    if !server.is_host_allowed(&host) {
        tracing::warn!("Rejected request with disallowed Host header {:?}", host);
        return ApiError::bad_request(format!("Invalid HTTP_HOST header: {:?}.", host))
            .into_response();
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}
