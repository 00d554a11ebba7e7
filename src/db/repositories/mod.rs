//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod attraction;
pub mod review;
pub mod session;
pub mod user;

pub use attraction::{AttractionRepository, BulkStatusOutcome, SqlxAttractionRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
