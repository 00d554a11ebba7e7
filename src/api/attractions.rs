//! Attraction API endpoints
//!
//! - GET    /api/v1/attractions - List/search/filter
//! - POST   /api/v1/attractions - Submit (multipart)
//! - GET    /api/v1/attractions/categories - Category choices
//! - GET    /api/v1/attractions/map - Map markers
//! - GET    /api/v1/attractions/my-contributions - Caller's submissions
//! - GET    /api/v1/attractions/{id} - Detail
//! - PUT    /api/v1/attractions/{id} - Edit (multipart)
//! - DELETE /api/v1/attractions/{id} - Delete
//! - POST   /api/v1/attractions/{id}/reviews - Submit a review

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::default_page;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{AttractionResponse, CategoryChoice, PagedResponse, WithMessages};
use crate::models::{AttractionSummary, Category, MapMarker};
use crate::services::attraction::{AttractionDetail, AttractionForm, ImageUpload};
use crate::services::review::{ReviewForm, ReviewOutcome};

/// Query parameters for the public list
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Query parameters for paginated views without filters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Build the attraction router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attractions).post(create_attraction))
        .route("/categories", get(list_categories))
        .route("/map", get(map_markers))
        .route("/my-contributions", get(my_contributions))
        .route(
            "/{id}",
            get(get_attraction)
                .put(update_attraction)
                .delete(delete_attraction),
        )
        .route("/{id}/reviews", post(submit_review))
}

/// GET /api/v1/attractions
async fn list_attractions(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResponse<AttractionSummary>>, ApiError> {
    let result = state
        .attraction_service
        .list(user.viewer(), query.q, query.category.as_deref(), query.page)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/attractions/categories
async fn list_categories() -> Json<Vec<CategoryChoice>> {
    Json(
        Category::ALL
            .iter()
            .map(|c| CategoryChoice {
                code: c.as_str(),
                label: c.label(),
            })
            .collect(),
    )
}

/// GET /api/v1/attractions/map
async fn map_markers(
    State(state): State<AppState>,
    user: MaybeUser,
) -> Result<Json<Vec<MapMarker>>, ApiError> {
    let markers = state.attraction_service.markers(user.viewer()).await?;
    Ok(Json(markers))
}

/// GET /api/v1/attractions/my-contributions
async fn my_contributions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PagedResponse<AttractionSummary>>, ApiError> {
    let result = state
        .attraction_service
        .my_contributions(&user, query.page)
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/attractions/{id}
async fn get_attraction(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<AttractionDetail>, ApiError> {
    let detail = state.attraction_service.detail(id, user.viewer()).await?;
    Ok(Json(detail))
}

/// POST /api/v1/attractions
async fn create_attraction(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_attraction_form(multipart).await?;
    let (attraction, message) = state.attraction_service.create(&user, form).await?;

    Ok((
        StatusCode::CREATED,
        Json(WithMessages::new(AttractionResponse::from(attraction), message)),
    ))
}

/// PUT /api/v1/attractions/{id}
async fn update_attraction(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<WithMessages<AttractionResponse>>, ApiError> {
    let form = read_attraction_form(multipart).await?;
    let (attraction, message) = state.attraction_service.update(id, &user, form).await?;

    Ok(Json(WithMessages::new(attraction.into(), message)))
}

/// DELETE /api/v1/attractions/{id}
async fn delete_attraction(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.attraction_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/attractions/{id}/reviews
///
/// 201 with the refreshed detail for a new review, 200 with a warning when
/// the caller already reviewed this attraction.
async fn submit_review(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(form): Json<ReviewForm>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.review_service.submit(id, &user, form).await?;
    let status = match outcome {
        ReviewOutcome::Created(_) => StatusCode::CREATED,
        ReviewOutcome::AlreadyReviewed => {
            tracing::info!("{} tried to review attraction {} twice", user.username, id);
            StatusCode::OK
        }
    };

    let detail = state.attraction_service.detail(id, user.viewer()).await?;
    Ok((status, Json(WithMessages::new(detail, outcome.message()))))
}

/// Collect the text fields and optional `image` file of an attraction form
async fn read_attraction_form(mut multipart: Multipart) -> Result<AttractionForm, ApiError> {
    let mut form = AttractionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "image" {
            let filename = field.file_name().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
            // Browsers send an empty part when no file was chosen
            if !filename.is_empty() || !data.is_empty() {
                form.image = Some(ImageUpload {
                    filename,
                    data: data.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read field {}: {}", name, e)))?;
        let slot = match name.as_str() {
            "name" => &mut form.name,
            "description" => &mut form.description,
            "category" => &mut form.category,
            "location" => &mut form.location,
            "latitude" => &mut form.latitude,
            "longitude" => &mut form.longitude,
            "is_open" => &mut form.is_open,
            "clear_image" => &mut form.clear_image,
            _ => continue,
        };
        *slot = Some(value);
    }

    Ok(form)
}
