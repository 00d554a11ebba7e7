//! Review service
//!
//! One review per user per attraction. A second attempt is not an error:
//! the caller gets [`ReviewOutcome::AlreadyReviewed`] and nothing is written.

use crate::db::is_unique_violation;
use crate::db::repositories::ReviewRepository;
use crate::models::{CreateReviewInput, Review, User};
use crate::services::attraction::{AttractionService, AttractionServiceError};
use crate::services::messages::Message;
use crate::services::validation::{self, FormErrors};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const ALREADY_REVIEWED: &str = "You have already submitted a review for this attraction.";
pub const REVIEW_SUBMITTED: &str = "Thank you! Your review has been submitted.";

/// Error types for review service operations
#[derive(Debug, thiserror::Error)]
pub enum ReviewServiceError {
    /// Attraction missing or not visible to the reviewer
    #[error("Attraction not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(#[from] FormErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AttractionServiceError> for ReviewServiceError {
    fn from(err: AttractionServiceError) -> Self {
        match err {
            AttractionServiceError::NotFound | AttractionServiceError::PermissionDenied(_) => {
                ReviewServiceError::NotFound
            }
            AttractionServiceError::ValidationError(errors) => errors.into(),
            AttractionServiceError::InternalError(e) => e.into(),
        }
    }
}

/// Review form. `rating` may arrive as a number or a numeric string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// What happened to a submission
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Created(Review),
    AlreadyReviewed,
}

impl ReviewOutcome {
    /// Flash message for the outcome
    pub fn message(&self) -> Message {
        match self {
            ReviewOutcome::Created(_) => Message::success(REVIEW_SUBMITTED),
            ReviewOutcome::AlreadyReviewed => Message::warning(ALREADY_REVIEWED),
        }
    }
}

/// Review service
pub struct ReviewService {
    review_repo: Arc<dyn ReviewRepository>,
    attractions: Arc<AttractionService>,
}

impl ReviewService {
    pub fn new(
        review_repo: Arc<dyn ReviewRepository>,
        attractions: Arc<AttractionService>,
    ) -> Self {
        Self {
            review_repo,
            attractions,
        }
    }

    /// Submit a review of a visible attraction.
    ///
    /// The duplicate check comes before form validation, so a repeat
    /// submission with a bad form still reports `AlreadyReviewed`.
    pub async fn submit(
        &self,
        attraction_id: i64,
        user: &User,
        form: ReviewForm,
    ) -> Result<ReviewOutcome, ReviewServiceError> {
        self.attractions
            .get_visible(attraction_id, &user.viewer())
            .await?;

        let existing = self
            .review_repo
            .get_by_attraction_and_user(attraction_id, user.id)
            .await
            .context("Failed to check for an existing review")?;
        if existing.is_some() {
            return Ok(ReviewOutcome::AlreadyReviewed);
        }

        let mut errors = FormErrors::new();
        let rating = errors.check(
            "rating",
            parse_rating(form.rating.as_ref()).and_then(validation::validate_rating),
        );
        let comment =
            errors.check("comment", validation::validate_comment(form.comment.as_deref()));
        let (Some(rating), Some(comment)) = (rating, comment) else {
            return Err(errors.into());
        };

        let input = CreateReviewInput {
            attraction_id,
            user_id: user.id,
            rating,
            comment,
        };
        match self.review_repo.create(&input).await {
            Ok(review) => {
                tracing::info!(
                    "{} rated attraction {} with {}",
                    user.username,
                    attraction_id,
                    review.rating
                );
                Ok(ReviewOutcome::Created(review))
            }
            Err(e) if is_unique_violation(&e) => Ok(ReviewOutcome::AlreadyReviewed),
            Err(e) => Err(e.context("Failed to create review").into()),
        }
    }
}

/// Rating as sent by a JSON body or a form field
fn parse_rating(raw: Option<&Value>) -> Result<Option<i64>, String> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(whole_number),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| whole_number()),
        Some(_) => Err(whole_number()),
    }
}

fn whole_number() -> String {
    "Enter a whole number.".to_string()
}
