//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Registration, then automatic login
//! - POST /api/v1/auth/login - Login
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current user
//!
//! Successful login and registration set the `session` cookie and also
//! return the token for clients that prefer a Bearer header.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{
    extract_session_token, ApiError, AppState, AuthenticatedUser, SESSION_COOKIE,
};
use crate::models::{Session, User};
use crate::services::user::{LoginInput, RegisterInput};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// `Set-Cookie` headers carrying `token`
fn session_cookie(token: &str) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        Session::max_age_secs()
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// `Set-Cookie` headers that expire the session cookie
fn cleared_session_cookie() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"),
    );
    headers
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register(body).await?;
    let token = state.user_service.start_session(user.id).await?;

    Ok((
        StatusCode::CREATED,
        session_cookie(&token)?,
        Json(AuthResponse { user, token }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = state.user_service.login(body).await?;
    tracing::info!("User {} logged in", user.username);

    Ok((session_cookie(&token)?, Json(AuthResponse { user, token })))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    tracing::info!("User {} logged out", user.username);

    Ok((cleared_session_cookie(), StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/me
async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}
