//! Review repository
//!
//! Database operations for attraction reviews. The `(attraction_id, user_id)`
//! pair is unique at the database level.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateReviewInput, Review, ReviewWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Review repository trait
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a review
    async fn create(&self, input: &CreateReviewInput) -> Result<Review>;

    /// The review `user_id` left on `attraction_id`, if any
    async fn get_by_attraction_and_user(
        &self,
        attraction_id: i64,
        user_id: i64,
    ) -> Result<Option<Review>>;

    /// All reviews of an attraction, newest first
    async fn list_by_attraction(&self, attraction_id: i64) -> Result<Vec<ReviewWithAuthor>>;
}

/// SQLx-based review repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    /// Create a new SQLx review repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO reviews (attraction_id, user_id, rating, comment, created_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const SELECT_BY_PAIR_SQL: &str = r#"
    SELECT id, attraction_id, user_id, rating, comment, created_at
    FROM reviews
    WHERE attraction_id = ? AND user_id = ?
"#;

const LIST_SQL: &str = r#"
    SELECT r.id, r.attraction_id, r.user_id, r.rating, r.comment, r.created_at, u.username
    FROM reviews r
    INNER JOIN users u ON u.id = r.user_id
    WHERE r.attraction_id = ?
    ORDER BY r.created_at DESC, r.id DESC
"#;

/// Maps a review row; works for either driver's row type.
macro_rules! review_from_row {
    ($row:expr) => {
        Review {
            id: $row.get("id"),
            attraction_id: $row.get("attraction_id"),
            user_id: $row.get("user_id"),
            rating: $row.get("rating"),
            comment: $row.get("comment"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, input: &CreateReviewInput) -> Result<Review> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_SQL)
                .bind(input.attraction_id)
                .bind(input.user_id)
                .bind(input.rating)
                .bind(&input.comment)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create review")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_SQL)
                .bind(input.attraction_id)
                .bind(input.user_id)
                .bind(input.rating)
                .bind(&input.comment)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create review")?
                .last_insert_id() as i64,
        };

        Ok(Review {
            id,
            attraction_id: input.attraction_id,
            user_id: input.user_id,
            rating: input.rating,
            comment: input.comment.clone(),
            created_at: now,
        })
    }

    async fn get_by_attraction_and_user(
        &self,
        attraction_id: i64,
        user_id: i64,
    ) -> Result<Option<Review>> {
        let review = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_BY_PAIR_SQL)
                .bind(attraction_id)
                .bind(user_id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get review")?
                .map(|row| review_from_row!(row)),
            DatabaseDriver::Mysql => sqlx::query(SELECT_BY_PAIR_SQL)
                .bind(attraction_id)
                .bind(user_id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get review")?
                .map(|row| review_from_row!(row)),
        };
        Ok(review)
    }

    async fn list_by_attraction(&self, attraction_id: i64) -> Result<Vec<ReviewWithAuthor>> {
        let reviews: Vec<ReviewWithAuthor> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(LIST_SQL)
                .bind(attraction_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list reviews")?
                .iter()
                .map(|row| ReviewWithAuthor {
                    review: review_from_row!(row),
                    username: row.get("username"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(LIST_SQL)
                .bind(attraction_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list reviews")?
                .iter()
                .map(|row| ReviewWithAuthor {
                    review: review_from_row!(row),
                    username: row.get("username"),
                })
                .collect(),
        };
        Ok(reviews)
    }
}
