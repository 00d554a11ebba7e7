//! Attraction model
//!
//! This module provides:
//! - `Attraction` entity, a listed point of interest
//! - `Category` and `AttractionStatus` enums
//! - `Viewer`, the requester as seen by the visibility policy
//! - Input and query types for the repository layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default map position (Davao City).
pub const DEFAULT_LATITUDE: f64 = 7.0686;
pub const DEFAULT_LONGITUDE: f64 = 125.6063;

/// Attraction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attraction {
    /// Unique identifier
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    pub description: String,
    pub category: Category,
    /// Free-form address
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Submitting user, `None` once that account is deleted
    pub contributor_id: Option<i64>,
    /// Relative path under the media root
    pub image: Option<String>,
    pub is_open: bool,
    /// Moderation status
    pub status: AttractionStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Attraction {
    /// Whether `viewer` may see this attraction.
    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        viewer.can_view(self.status, self.contributor_id)
    }

    /// Whether `viewer` may edit or delete this attraction.
    pub fn can_be_modified_by(&self, viewer: &Viewer) -> bool {
        viewer.can_modify(self.contributor_id)
    }

    /// Public URL of the image, when there is one.
    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|path| format!("/media/{}", path))
    }
}

/// Attraction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[default]
    Nature,
    Cultural,
    Food,
    Shopping,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 4] = [
        Category::Nature,
        Category::Cultural,
        Category::Food,
        Category::Shopping,
    ];

    /// Convert category to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Nature => "NATURE",
            Category::Cultural => "CULTURAL",
            Category::Food => "FOOD",
            Category::Shopping => "SHOPPING",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Nature => "Nature & Outdoors",
            Category::Cultural => "Culture & History",
            Category::Food => "Food & Nightlife",
            Category::Shopping => "Shopping & Malls",
        }
    }

    /// Parse a category code, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NATURE" => Some(Category::Nature),
            "CULTURAL" => Some(Category::Cultural),
            "FOOD" => Some(Category::Food),
            "SHOPPING" => Some(Category::Shopping),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttractionStatus {
    /// Waiting for staff review, hidden from the public
    #[default]
    Pending,
    /// Publicly visible
    Approved,
    /// Hidden from the public
    Rejected,
}

impl AttractionStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AttractionStatus::Pending => "PENDING",
            AttractionStatus::Approved => "APPROVED",
            AttractionStatus::Rejected => "REJECTED",
        }
    }

    /// Parse status from database string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(AttractionStatus::Pending),
            "APPROVED" => Some(AttractionStatus::Approved),
            "REJECTED" => Some(AttractionStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The requester, as seen by the visibility and ownership rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    /// Authenticated non-staff user
    Member(i64),
    /// Authenticated staff user
    Staff(i64),
}

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Member(id) | Viewer::Staff(id) => Some(*id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Viewer::Staff(_))
    }

    /// Staff see everything; others see approved items and their own.
    pub fn can_view(&self, status: AttractionStatus, contributor_id: Option<i64>) -> bool {
        match self {
            Viewer::Staff(_) => true,
            _ if status == AttractionStatus::Approved => true,
            Viewer::Member(id) => contributor_id == Some(*id),
            Viewer::Anonymous => false,
        }
    }

    /// Only the contributor or staff may edit or delete.
    pub fn can_modify(&self, contributor_id: Option<i64>) -> bool {
        match self {
            Viewer::Staff(_) => true,
            Viewer::Member(id) => contributor_id == Some(*id),
            Viewer::Anonymous => false,
        }
    }

    /// Status given to a new submission.
    pub fn initial_status(&self) -> AttractionStatus {
        if self.is_staff() {
            AttractionStatus::Approved
        } else {
            AttractionStatus::Pending
        }
    }

    /// Whether this viewer's edit sends an approved item back to moderation.
    ///
    /// Applied against the stored status at write time, so staff edits
    /// never change status and member edits only touch APPROVED rows.
    pub fn edit_resets_approval(&self) -> bool {
        matches!(self, Viewer::Member(_))
    }
}

/// Input for creating a new attraction
#[derive(Debug, Clone)]
pub struct CreateAttractionInput {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub contributor_id: Option<i64>,
    pub image: Option<String>,
    pub is_open: bool,
    pub status: AttractionStatus,
}

/// Input for updating an existing attraction. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateAttractionInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `Some(None)` clears the image
    pub image: Option<Option<String>>,
    pub is_open: Option<bool>,
}

impl UpdateAttractionInput {
    /// Apply the changes to `attraction` in place.
    pub fn apply_to(&self, attraction: &mut Attraction) {
        if let Some(name) = &self.name {
            attraction.name = name.clone();
        }
        if let Some(description) = &self.description {
            attraction.description = description.clone();
        }
        if let Some(category) = self.category {
            attraction.category = category;
        }
        if let Some(location) = &self.location {
            attraction.location = location.clone();
        }
        if let Some(latitude) = self.latitude {
            attraction.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            attraction.longitude = longitude;
        }
        if let Some(image) = &self.image {
            attraction.image = image.clone();
        }
        if let Some(is_open) = self.is_open {
            attraction.is_open = is_open;
        }
    }
}

/// List item: an attraction with its aggregate rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttractionSummary {
    #[serde(flatten)]
    pub attraction: Attraction,
    pub average_rating: f64,
    pub review_count: i64,
}

/// Map marker for an attraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Sort order for attraction lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttractionOrder {
    /// Alphabetical by name
    #[default]
    Name,
    /// Newest first
    Newest,
}

/// Filters for attraction list queries. All filters combine with AND.
#[derive(Debug, Clone, Default)]
pub struct AttractionQuery {
    /// Visibility is applied for this viewer
    pub viewer: Viewer,
    /// Case-insensitive substring
    pub search: Option<String>,
    /// Whether `search` also matches the location
    pub search_location: bool,
    pub category: Option<Category>,
    pub status: Option<AttractionStatus>,
    pub is_open: Option<bool>,
    pub contributor_id: Option<i64>,
    pub order: AttractionOrder,
}

impl AttractionQuery {
    /// Public listing for `viewer`: searches name, description and location.
    pub fn for_viewer(viewer: Viewer) -> Self {
        Self {
            viewer,
            search_location: true,
            ..Default::default()
        }
    }

    /// Set the search text; blank input means no search
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_status(mut self, status: Option<AttractionStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_is_open(mut self, is_open: Option<bool>) -> Self {
        self.is_open = is_open;
        self
    }

    pub fn with_contributor(mut self, contributor_id: i64) -> Self {
        self.contributor_id = Some(contributor_id);
        self
    }

    pub fn with_order(mut self, order: AttractionOrder) -> Self {
        self.order = order;
        self
    }
}
