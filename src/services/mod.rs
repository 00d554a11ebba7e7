//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They:
//! - Validate raw form input and collect per-field errors
//! - Apply the visibility, ownership and moderation rules
//! - Manage sessions and stored photos

pub mod attraction;
pub mod media;
pub mod messages;
pub mod password;
pub mod review;
pub mod session_token;
pub mod user;
pub mod validation;

pub use attraction::{
    AdminFilter, AttractionDetail, AttractionForm, AttractionService, AttractionServiceError,
    ImageUpload,
};
pub use media::MediaStore;
pub use messages::{Message, MessageLevel};
pub use password::{hash_password, verify_password};
pub use review::{ReviewForm, ReviewOutcome, ReviewService, ReviewServiceError};
pub use session_token::SessionSigner;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
pub use validation::FormErrors;
