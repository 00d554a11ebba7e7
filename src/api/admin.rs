//! Admin API endpoints
//!
//! Staff only; the router is wrapped in `require_staff`.
//!
//! - GET  /api/v1/admin/attractions - All attractions with filters
//! - POST /api/v1/admin/attractions/approve - Bulk approve `{ids}`
//! - POST /api/v1/admin/attractions/reject - Bulk reject `{ids}`

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::default_page;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PagedResponse;
use crate::models::{AttractionStatus, AttractionSummary};
use crate::services::attraction::AdminFilter;

/// Query parameters for the admin list
#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub is_open: Option<String>,
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Request body for bulk moderation
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

/// Response for bulk moderation
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub status: AttractionStatus,
    pub updated: Vec<i64>,
    pub skipped: Vec<i64>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attractions", get(list_attractions))
        .route("/attractions/approve", post(approve))
        .route("/attractions/reject", post(reject))
}

/// GET /api/v1/admin/attractions
async fn list_attractions(
    State(state): State<AppState>,
    AuthenticatedUser(staff): AuthenticatedUser,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<PagedResponse<AttractionSummary>>, ApiError> {
    let filter = AdminFilter {
        status: query.status,
        category: query.category,
        is_open: query.is_open,
        q: query.q,
    };
    let result = state
        .attraction_service
        .admin_list(&staff, filter, query.page)
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/v1/admin/attractions/approve
async fn approve(
    state: State<AppState>,
    user: AuthenticatedUser,
    body: Json<BulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    moderate(state, user, body, AttractionStatus::Approved).await
}

/// POST /api/v1/admin/attractions/reject
async fn reject(
    state: State<AppState>,
    user: AuthenticatedUser,
    body: Json<BulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    moderate(state, user, body, AttractionStatus::Rejected).await
}

async fn moderate(
    State(state): State<AppState>,
    AuthenticatedUser(staff): AuthenticatedUser,
    Json(body): Json<BulkRequest>,
    status: AttractionStatus,
) -> Result<Json<BulkResponse>, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::bad_request("Select at least one attraction."));
    }

    let outcome = state
        .attraction_service
        .moderate(&staff, &body.ids, status)
        .await?;

    Ok(Json(BulkResponse {
        status,
        updated: outcome.updated,
        skipped: outcome.skipped,
    }))
}
