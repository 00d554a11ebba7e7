//! Data models
//!
//! Data structures used throughout the city guide:
//! - Database entities (User, Session, Attraction, Review)
//! - The visibility policy (`Viewer`)
//! - Query, input and pagination types

mod attraction;
mod pagination;
mod review;
mod session;
mod user;

pub use attraction::{
    Attraction, AttractionOrder, AttractionQuery, AttractionStatus, AttractionSummary, Category,
    CreateAttractionInput, MapMarker, UpdateAttractionInput, Viewer, DEFAULT_LATITUDE,
    DEFAULT_LONGITUDE,
};
pub use pagination::{ListParams, PagedResult, PAGE_SIZE};
pub use review::{average_rating, CreateReviewInput, Review, ReviewWithAuthor};
pub use session::{Session, SESSION_LIFETIME_DAYS};
pub use user::{User, UserRole};
