//! Attraction service
//!
//! Business logic for attraction listings:
//! - Visibility policy for list, detail and map views
//! - Submission and editing with form validation and photo storage
//! - The moderation workflow (auto-approval for staff, re-review after a
//!   member edits an approved listing, bulk approve/reject)

use crate::config::UploadConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::{AttractionRepository, BulkStatusOutcome, ReviewRepository};
use crate::models::{
    average_rating, Attraction, AttractionOrder, AttractionQuery, AttractionStatus,
    AttractionSummary, Category, CreateAttractionInput, ListParams, MapMarker, PagedResult,
    ReviewWithAuthor, UpdateAttractionInput, User, Viewer, DEFAULT_LATITUDE, DEFAULT_LONGITUDE,
};
use crate::services::media::MediaStore;
use crate::services::messages::Message;
use crate::services::validation::{self, FormErrors};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

pub const CREATED_APPROVED: &str = "Attraction created and approved!";
pub const CREATED_PENDING: &str = "Attraction submitted! It will be visible after admin approval.";
pub const UPDATED_RESET: &str = "Attraction updated. Status reset to PENDING for admin review.";
pub const UPDATED: &str = "Attraction updated successfully!";
pub const NAME_TAKEN: &str = "Attraction with this Name already exists.";

/// Error types for attraction service operations
#[derive(Debug, thiserror::Error)]
pub enum AttractionServiceError {
    /// Missing, or not visible to the requester
    #[error("Attraction not found")]
    NotFound,

    /// Visible but not editable by the requester
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// One or more form fields are invalid
    #[error("Validation error: {0}")]
    ValidationError(#[from] FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Uploaded photo, as received
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw attraction form. Absent fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct AttractionForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub is_open: Option<String>,
    pub image: Option<ImageUpload>,
    pub clear_image: Option<String>,
}

/// Admin list filters, as received
#[derive(Debug, Clone, Default)]
pub struct AdminFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub is_open: Option<String>,
    pub q: Option<String>,
}

/// Everything the detail view shows
#[derive(Debug, Clone, Serialize)]
pub struct AttractionDetail {
    #[serde(flatten)]
    pub attraction: Attraction,
    pub image_url: Option<String>,
    pub average_rating: f64,
    pub review_count: usize,
    /// Newest first
    pub reviews: Vec<ReviewWithAuthor>,
    /// `None` for anonymous viewers
    pub has_reviewed: Option<bool>,
    pub can_edit: bool,
}

/// Attraction service
pub struct AttractionService {
    attraction_repo: Arc<dyn AttractionRepository>,
    review_repo: Arc<dyn ReviewRepository>,
    media: MediaStore,
    upload: UploadConfig,
}

impl AttractionService {
    /// Create a new attraction service
    pub fn new(
        attraction_repo: Arc<dyn AttractionRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        media: MediaStore,
        upload: UploadConfig,
    ) -> Self {
        Self {
            attraction_repo,
            review_repo,
            media,
            upload,
        }
    }

    /// Public list: search and category filter, sorted by name.
    ///
    /// `category` of `ALL` or blank means no filter. A page past the last
    /// one is `NotFound`.
    pub async fn list(
        &self,
        viewer: Viewer,
        search: Option<String>,
        category: Option<&str>,
        page: u32,
    ) -> Result<PagedResult<AttractionSummary>, AttractionServiceError> {
        let mut errors = FormErrors::new();
        let category = errors.check("category", parse_category_filter(category));
        errors.into_result()?;

        let query = AttractionQuery::for_viewer(viewer)
            .with_search(search)
            .with_category(category.flatten());
        self.paged(&query, page).await
    }

    /// The caller's own attractions in any status, newest first
    pub async fn my_contributions(
        &self,
        user: &User,
        page: u32,
    ) -> Result<PagedResult<AttractionSummary>, AttractionServiceError> {
        let query = AttractionQuery::for_viewer(user.viewer())
            .with_contributor(user.id)
            .with_order(AttractionOrder::Newest);
        self.paged(&query, page).await
    }

    /// Staff list with status, category, open and text filters
    pub async fn admin_list(
        &self,
        staff: &User,
        filter: AdminFilter,
        page: u32,
    ) -> Result<PagedResult<AttractionSummary>, AttractionServiceError> {
        let mut errors = FormErrors::new();
        let category = errors.check("category", parse_category_filter(filter.category.as_deref()));
        let status = errors.check("status", parse_status_filter(filter.status.as_deref()));
        let is_open = match filter.is_open.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => errors.check("is_open", validation::parse_bool_field(raw)),
        };
        errors.into_result()?;

        let query = AttractionQuery {
            viewer: staff.viewer(),
            ..Default::default()
        }
        .with_search(filter.q)
        .with_category(category.flatten())
        .with_status(status.flatten())
        .with_is_open(is_open);
        self.paged(&query, page).await
    }

    async fn paged(
        &self,
        query: &AttractionQuery,
        page: u32,
    ) -> Result<PagedResult<AttractionSummary>, AttractionServiceError> {
        let params = ListParams::page(page);
        let (items, total) = self
            .attraction_repo
            .list(query, &params)
            .await
            .context("Failed to list attractions")?;

        let result = PagedResult::new(items, total, &params);
        if result.is_out_of_range() {
            return Err(AttractionServiceError::NotFound);
        }
        Ok(result)
    }

    /// Detail view. Attractions the viewer may not see are `NotFound`.
    pub async fn detail(
        &self,
        id: i64,
        viewer: Viewer,
    ) -> Result<AttractionDetail, AttractionServiceError> {
        let attraction = self.get_visible(id, &viewer).await?;

        let reviews = self
            .review_repo
            .list_by_attraction(id)
            .await
            .context("Failed to load reviews")?;
        let ratings: Vec<i32> = reviews.iter().map(|r| r.review.rating).collect();
        let has_reviewed = viewer
            .user_id()
            .map(|user_id| reviews.iter().any(|r| r.review.user_id == user_id));

        Ok(AttractionDetail {
            image_url: attraction.image_url(),
            average_rating: average_rating(&ratings),
            review_count: reviews.len(),
            has_reviewed,
            can_edit: attraction.can_be_modified_by(&viewer),
            attraction,
            reviews,
        })
    }

    /// Fetch an attraction the viewer is allowed to see
    pub async fn get_visible(
        &self,
        id: i64,
        viewer: &Viewer,
    ) -> Result<Attraction, AttractionServiceError> {
        let attraction = self
            .attraction_repo
            .get_by_id(id)
            .await
            .context("Failed to get attraction")?
            .ok_or(AttractionServiceError::NotFound)?;

        if attraction.is_visible_to(viewer) {
            Ok(attraction)
        } else {
            Err(AttractionServiceError::NotFound)
        }
    }

    /// Map markers for everything the viewer can see
    pub async fn markers(&self, viewer: Viewer) -> Result<Vec<MapMarker>, AttractionServiceError> {
        let markers = self
            .attraction_repo
            .markers(&viewer)
            .await
            .context("Failed to load map markers")?;
        Ok(markers)
    }

    /// Submit a new attraction. Staff submissions are approved immediately.
    pub async fn create(
        &self,
        user: &User,
        form: AttractionForm,
    ) -> Result<(Attraction, Message), AttractionServiceError> {
        let viewer = user.viewer();
        let mut errors = FormErrors::new();

        let name = errors.check(
            "name",
            validation::required_max(form.name.as_deref(), validation::NAME_MAX_CHARS),
        );
        let description =
            errors.check("description", validation::required(form.description.as_deref()));
        let category = errors.check(
            "category",
            validation::required(form.category.as_deref())
                .and_then(|raw| validation::parse_category(&raw)),
        );
        let location = errors.check(
            "location",
            validation::required_max(form.location.as_deref(), validation::LOCATION_MAX_CHARS),
        );
        let latitude = check_coordinate(&mut errors, "latitude", form.latitude.as_deref())
            .map(|v| v.unwrap_or(DEFAULT_LATITUDE));
        let longitude = check_coordinate(&mut errors, "longitude", form.longitude.as_deref())
            .map(|v| v.unwrap_or(DEFAULT_LONGITUDE));
        let is_open = match form.is_open.as_deref() {
            None => Some(true),
            Some(raw) => errors.check("is_open", validation::parse_bool_field(raw)),
        };
        let image_ext = self.check_image(&mut errors, form.image.as_ref());

        if let Some(name) = &name {
            if self.name_taken(name, None).await? {
                errors.add("name", NAME_TAKEN);
            }
        }

        let (
            Some(name),
            Some(description),
            Some(category),
            Some(location),
            Some(latitude),
            Some(longitude),
            Some(is_open),
            true,
        ) = (
            name,
            description,
            category,
            location,
            latitude,
            longitude,
            is_open,
            errors.is_empty(),
        )
        else {
            return Err(errors.into());
        };

        let image = match (&form.image, image_ext) {
            (Some(upload), Some(ext)) => Some(self.media.save_photo(&ext, &upload.data).await?),
            _ => None,
        };

        let status = viewer.initial_status();
        let input = CreateAttractionInput {
            name,
            description,
            category,
            location,
            latitude,
            longitude,
            contributor_id: Some(user.id),
            image: image.clone(),
            is_open,
            status,
        };

        let created = match self.attraction_repo.create(&input).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(path) = &image {
                    self.media.remove(path).await;
                }
                if is_unique_violation(&e) {
                    return Err(FormErrors::single("name", NAME_TAKEN).into());
                }
                return Err(e.context("Failed to create attraction").into());
            }
        };

        tracing::info!(
            "Attraction {} \"{}\" submitted by {} as {}",
            created.id,
            created.name,
            user.username,
            created.status
        );

        let message = if status == AttractionStatus::Approved {
            Message::success(CREATED_APPROVED)
        } else {
            Message::success(CREATED_PENDING)
        };
        Ok((created, message))
    }

    /// Edit an attraction. Omitted fields keep their values.
    ///
    /// A member editing their approved listing sends it back to PENDING.
    pub async fn update(
        &self,
        id: i64,
        user: &User,
        form: AttractionForm,
    ) -> Result<(Attraction, Message), AttractionServiceError> {
        let viewer = user.viewer();
        let mut attraction = self.get_modifiable(id, &viewer).await?;
        let mut errors = FormErrors::new();
        let mut changes = UpdateAttractionInput::default();

        if form.name.is_some() {
            changes.name = errors.check(
                "name",
                validation::required_max(form.name.as_deref(), validation::NAME_MAX_CHARS),
            );
        }
        if form.description.is_some() {
            changes.description =
                errors.check("description", validation::required(form.description.as_deref()));
        }
        if let Some(raw) = form.category.as_deref() {
            changes.category = errors.check("category", validation::parse_category(raw));
        }
        if form.location.is_some() {
            changes.location = errors.check(
                "location",
                validation::required_max(form.location.as_deref(), validation::LOCATION_MAX_CHARS),
            );
        }
        changes.latitude =
            check_coordinate(&mut errors, "latitude", form.latitude.as_deref()).flatten();
        changes.longitude =
            check_coordinate(&mut errors, "longitude", form.longitude.as_deref()).flatten();
        if let Some(raw) = form.is_open.as_deref() {
            changes.is_open = errors.check("is_open", validation::parse_bool_field(raw));
        }
        let clear_image = match form.clear_image.as_deref() {
            None => false,
            Some(raw) => errors
                .check("clear_image", validation::parse_bool_field(raw))
                .unwrap_or(false),
        };
        let image_ext = self.check_image(&mut errors, form.image.as_ref());

        if let Some(name) = &changes.name {
            if name != &attraction.name && self.name_taken(name, Some(id)).await? {
                errors.add("name", NAME_TAKEN);
            }
        }
        errors.into_result()?;

        let old_image = attraction.image.clone();
        let new_image = match (&form.image, image_ext) {
            (Some(upload), Some(ext)) => Some(self.media.save_photo(&ext, &upload.data).await?),
            _ => None,
        };
        if new_image.is_some() {
            changes.image = Some(new_image.clone());
        } else if clear_image {
            changes.image = Some(None);
        }

        let previous_status = attraction.status;
        changes.apply_to(&mut attraction);

        let stored = self
            .attraction_repo
            .update(&attraction, viewer.edit_resets_approval())
            .await;
        let updated = match stored {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                if let Some(path) = &new_image {
                    self.media.remove(path).await;
                }
                return Err(AttractionServiceError::NotFound);
            }
            Err(e) => {
                if let Some(path) = &new_image {
                    self.media.remove(path).await;
                }
                if is_unique_violation(&e) {
                    return Err(FormErrors::single("name", NAME_TAKEN).into());
                }
                return Err(e.context("Failed to update attraction").into());
            }
        };

        if let Some(old) = old_image {
            if updated.image.as_deref() != Some(old.as_str()) {
                self.media.remove(&old).await;
            }
        }

        let reset = previous_status == AttractionStatus::Approved
            && updated.status == AttractionStatus::Pending;
        let message = if reset {
            tracing::info!(
                "Attraction {} edited by {}; status reset to {}",
                updated.id,
                user.username,
                updated.status
            );
            Message::info(UPDATED_RESET)
        } else {
            Message::success(UPDATED)
        };
        Ok((updated, message))
    }

    /// Delete an attraction and its photo
    pub async fn delete(&self, id: i64, user: &User) -> Result<(), AttractionServiceError> {
        let attraction = self.get_modifiable(id, &user.viewer()).await?;

        let deleted = self
            .attraction_repo
            .delete(id)
            .await
            .context("Failed to delete attraction")?;
        if !deleted {
            return Err(AttractionServiceError::NotFound);
        }

        if let Some(image) = &attraction.image {
            self.media.remove(image).await;
        }
        tracing::info!("Attraction {} deleted by {}", id, user.username);
        Ok(())
    }

    /// Approve or reject pending attractions in bulk
    pub async fn moderate(
        &self,
        staff: &User,
        ids: &[i64],
        status: AttractionStatus,
    ) -> Result<BulkStatusOutcome, AttractionServiceError> {
        if !staff.is_staff() {
            return Err(AttractionServiceError::PermissionDenied(
                "Only staff can moderate attractions".to_string(),
            ));
        }
        if status == AttractionStatus::Pending {
            return Err(FormErrors::single("status", "Choose APPROVED or REJECTED.").into());
        }

        let outcome = self
            .attraction_repo
            .set_status_bulk(ids, status)
            .await
            .context("Failed to change attraction status")?;

        tracing::info!(
            "{} marked {} attraction(s) {} ({} skipped)",
            staff.username,
            outcome.updated.len(),
            status,
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Visible and editable by `viewer`.
    async fn get_modifiable(
        &self,
        id: i64,
        viewer: &Viewer,
    ) -> Result<Attraction, AttractionServiceError> {
        let attraction = self.get_visible(id, viewer).await?;
        if !attraction.can_be_modified_by(viewer) {
            return Err(AttractionServiceError::PermissionDenied(
                "Only the contributor or staff can change this attraction".to_string(),
            ));
        }
        Ok(attraction)
    }

    async fn name_taken(&self, name: &str, except_id: Option<i64>) -> anyhow::Result<bool> {
        let existing = self
            .attraction_repo
            .get_by_name(name)
            .await
            .context("Failed to check attraction name")?;
        Ok(existing.is_some_and(|a| Some(a.id) != except_id))
    }

    fn check_image(&self, errors: &mut FormErrors, image: Option<&ImageUpload>) -> Option<String> {
        let image = image?;
        match validation::validate_image(&image.filename, image.data.len() as u64, &self.upload) {
            Ok(ext) => Some(ext),
            Err(messages) => {
                for message in messages {
                    errors.add("image", message);
                }
                None
            }
        }
    }
}

/// `Some(None)` when the field is absent, `None` when it is invalid.
fn check_coordinate(
    errors: &mut FormErrors,
    field: &str,
    raw: Option<&str>,
) -> Option<Option<f64>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Some(None);
    };
    let parsed = validation::parse_coordinate(raw).and_then(|value| {
        if field == "latitude" {
            validation::validate_latitude(value)
        } else {
            validation::validate_longitude(value)
        }
    });
    errors.check(field, parsed).map(Some)
}

/// Blank or `ALL` means no filter
fn parse_category_filter(raw: Option<&str>) -> Result<Option<Category>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(value) => validation::parse_category(value).map(Some),
    }
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<AttractionStatus>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(value) => AttractionStatus::parse(value).map(Some).ok_or_else(|| {
            format!(
                "Select a valid choice. {} is not one of the available choices.",
                value
            )
        }),
    }
}
