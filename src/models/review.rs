//! Review model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's rating and comment on one attraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub attraction_id: i64,
    pub user_id: i64,
    /// 1 to 5
    pub rating: i32,
    /// Trimmed comment text
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Review joined with its author's username, for detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub username: String,
}

/// Input for creating a review
#[derive(Debug, Clone)]
pub struct CreateReviewInput {
    pub attraction_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: String,
}

/// Arithmetic mean of `ratings`, 0 when there are none.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    sum as f64 / ratings.len() as f64
}
