//! Attraction repository
//!
//! Database operations for attractions.
//!
//! This module provides:
//! - `AttractionRepository` trait defining the interface for attraction data access
//! - `SqlxAttractionRepository` implementing the trait for SQLite and MySQL
//!
//! List queries apply the visibility policy in SQL: staff see every row,
//! everyone else sees approved rows plus their own contributions.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Attraction, AttractionOrder, AttractionQuery, AttractionStatus, AttractionSummary, Category,
    CreateAttractionInput, ListParams, MapMarker, Viewer,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ATTRACTION_COLUMNS: &str = "a.id, a.name, a.description, a.category, a.location, \
     a.latitude, a.longitude, a.contributor_id, a.image, a.is_open, a.status, \
     a.created_at, a.updated_at";

/// Visibility plus optional filters. Every `?` pair lets a NULL bind switch
/// the filter off, so one statement serves all combinations.
const FILTER_SQL: &str = r#"
    (? OR a.status = 'APPROVED' OR a.contributor_id = ?)
    AND (? IS NULL OR a.category = ?)
    AND (? IS NULL OR a.status = ?)
    AND (? IS NULL OR a.is_open = ?)
    AND (? IS NULL OR a.contributor_id = ?)
    AND (? IS NULL
         OR a.name LIKE ? ESCAPE '!'
         OR a.description LIKE ? ESCAPE '!'
         OR (? AND a.location LIKE ? ESCAPE '!'))
"#;

/// Status is decided against the stored row, never the caller's snapshot.
const UPDATE_SQL: &str = r#"
    UPDATE attractions
    SET name = ?, description = ?, category = ?, location = ?, latitude = ?, longitude = ?,
        image = ?, is_open = ?,
        status = CASE WHEN ? AND status = 'APPROVED' THEN 'PENDING' ELSE status END,
        updated_at = ?
    WHERE id = ?
"#;

/// Result of a bulk status change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkStatusOutcome {
    /// Ids that moved out of PENDING
    pub updated: Vec<i64>,
    /// Ids that were missing or not PENDING
    pub skipped: Vec<i64>,
}

/// Attraction repository trait
#[async_trait]
pub trait AttractionRepository: Send + Sync {
    /// Insert a new attraction
    async fn create(&self, input: &CreateAttractionInput) -> Result<Attraction>;

    /// Get attraction by ID, regardless of status
    async fn get_by_id(&self, id: i64) -> Result<Option<Attraction>>;

    /// Get attraction by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Attraction>>;

    /// Persist the editable columns of `attraction` and return the stored row.
    ///
    /// `status` is never written from the snapshot. When `reset_approved`
    /// is set, a row that is APPROVED at write time goes back to PENDING.
    /// Returns `None` when the row no longer exists.
    async fn update(&self, attraction: &Attraction, reset_approved: bool)
        -> Result<Option<Attraction>>;

    /// Delete an attraction. Returns false when it didn't exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Filtered, paginated list with rating aggregates, plus the total count
    async fn list(
        &self,
        query: &AttractionQuery,
        params: &ListParams,
    ) -> Result<(Vec<AttractionSummary>, i64)>;

    /// Map markers visible to `viewer`, excluding zero coordinates
    async fn markers(&self, viewer: &Viewer) -> Result<Vec<MapMarker>>;

    /// Move PENDING rows among `ids` to `status` in one transaction
    async fn set_status_bulk(&self, ids: &[i64], status: AttractionStatus)
        -> Result<BulkStatusOutcome>;
}

/// SQLx-based attraction repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxAttractionRepository {
    pool: DynDatabasePool,
}

impl SqlxAttractionRepository {
    /// Create a new SQLx attraction repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AttractionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AttractionRepository for SqlxAttractionRepository {
    async fn create(&self, input: &CreateAttractionInput) -> Result<Attraction> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_attraction_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_attraction_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Attraction>> {
        let sql = format!("SELECT {} FROM attractions a WHERE a.id = ?", ATTRACTION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get attraction by ID")?
                .map(|row| row_to_attraction_sqlite(&row))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get attraction by ID")?
                .map(|row| row_to_attraction_mysql(&row))
                .transpose(),
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Attraction>> {
        let sql = format!("SELECT {} FROM attractions a WHERE a.name = ?", ATTRACTION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.sqlite()?)
                .await
                .context("Failed to get attraction by name")?
                .map(|row| row_to_attraction_sqlite(&row))
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(name)
                .fetch_optional(self.pool.mysql()?)
                .await
                .context("Failed to get attraction by name")?
                .map(|row| row_to_attraction_mysql(&row))
                .transpose(),
        }
    }

    async fn update(
        &self,
        attraction: &Attraction,
        reset_approved: bool,
    ) -> Result<Option<Attraction>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_attraction_sqlite(self.pool.sqlite()?, attraction, reset_approved).await?
            }
            DatabaseDriver::Mysql => {
                update_attraction_mysql(self.pool.mysql()?, attraction, reset_approved).await?
            }
        }
        self.get_by_id(attraction.id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM attractions WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete attraction")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM attractions WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete attraction")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(
        &self,
        query: &AttractionQuery,
        params: &ListParams,
    ) -> Result<(Vec<AttractionSummary>, i64)> {
        let filter = ListFilter::from_query(query);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_attractions_sqlite(self.pool.sqlite()?, &filter, query.order, params).await
            }
            DatabaseDriver::Mysql => {
                list_attractions_mysql(self.pool.mysql()?, &filter, query.order, params).await
            }
        }
    }

    async fn markers(&self, viewer: &Viewer) -> Result<Vec<MapMarker>> {
        let sql = r#"
            SELECT a.id, a.name, a.location, a.latitude, a.longitude
            FROM attractions a
            WHERE (? OR a.status = 'APPROVED' OR a.contributor_id = ?)
              AND a.latitude <> 0 AND a.longitude <> 0
            ORDER BY a.name ASC, a.id ASC
        "#;
        let markers: Vec<MapMarker> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(viewer.is_staff())
                .bind(viewer.user_id())
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list map markers")?
                .iter()
                .map(|row| MapMarker {
                    id: row.get("id"),
                    name: row.get("name"),
                    location: row.get("location"),
                    latitude: row.get("latitude"),
                    longitude: row.get("longitude"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(viewer.is_staff())
                .bind(viewer.user_id())
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list map markers")?
                .iter()
                .map(|row| MapMarker {
                    id: row.get("id"),
                    name: row.get("name"),
                    location: row.get("location"),
                    latitude: row.get("latitude"),
                    longitude: row.get("longitude"),
                })
                .collect(),
        };
        Ok(markers)
    }

    async fn set_status_bulk(
        &self,
        ids: &[i64],
        status: AttractionStatus,
    ) -> Result<BulkStatusOutcome> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_status_bulk_sqlite(self.pool.sqlite()?, &unique, status).await
            }
            DatabaseDriver::Mysql => {
                set_status_bulk_mysql(self.pool.mysql()?, &unique, status).await
            }
        }
    }
}

/// Bind values for `FILTER_SQL`, in placeholder order.
struct ListFilter {
    staff: bool,
    viewer_id: Option<i64>,
    category: Option<&'static str>,
    status: Option<&'static str>,
    is_open: Option<bool>,
    contributor_id: Option<i64>,
    pattern: Option<String>,
    search_location: bool,
}

impl ListFilter {
    fn from_query(query: &AttractionQuery) -> Self {
        Self {
            staff: query.viewer.is_staff(),
            viewer_id: query.viewer.user_id(),
            category: query.category.map(|c| c.as_str()),
            status: query.status.map(|s| s.as_str()),
            is_open: query.is_open,
            contributor_id: query.contributor_id,
            pattern: query.search.as_deref().map(like_pattern),
            search_location: query.search_location,
        }
    }
}

/// Binds a `ListFilter` onto a query built from `FILTER_SQL`.
macro_rules! bind_filter {
    ($query:expr, $filter:expr) => {{
        let filter = $filter;
        let pattern = filter.pattern.as_deref();
        $query
            .bind(filter.staff)
            .bind(filter.viewer_id)
            .bind(filter.category)
            .bind(filter.category)
            .bind(filter.status)
            .bind(filter.status)
            .bind(filter.is_open)
            .bind(filter.is_open)
            .bind(filter.contributor_id)
            .bind(filter.contributor_id)
            .bind(pattern)
            .bind(pattern)
            .bind(pattern)
            .bind(filter.search_location)
            .bind(pattern)
    }};
}

/// `%term%` pattern with LIKE wildcards escaped by `!`.
///
/// Case folding is left to LIKE itself (ASCII on SQLite, the column
/// collation on MySQL) so the term and the column fold the same way.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn order_sql(order: AttractionOrder) -> &'static str {
    match order {
        AttractionOrder::Name => "a.name ASC, a.id ASC",
        AttractionOrder::Newest => "a.created_at DESC, a.id DESC",
    }
}

fn parse_category(value: &str) -> Result<Category> {
    Category::parse(value).ok_or_else(|| anyhow!("Invalid category in database: {}", value))
}

fn parse_status(value: &str) -> Result<AttractionStatus> {
    AttractionStatus::parse(value).ok_or_else(|| anyhow!("Invalid status in database: {}", value))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_attraction_sqlite(
    pool: &SqlitePool,
    input: &CreateAttractionInput,
) -> Result<Attraction> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO attractions (name, description, category, location, latitude, longitude,
                                 contributor_id, image, is_open, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.category.as_str())
    .bind(&input.location)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.contributor_id)
    .bind(&input.image)
    .bind(input.is_open)
    .bind(input.status.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create attraction")?;

    Ok(attraction_from_input(result.last_insert_rowid(), input, now))
}

async fn update_attraction_sqlite(
    pool: &SqlitePool,
    attraction: &Attraction,
    reset_approved: bool,
) -> Result<()> {
    sqlx::query(UPDATE_SQL)
        .bind(&attraction.name)
        .bind(&attraction.description)
        .bind(attraction.category.as_str())
        .bind(&attraction.location)
        .bind(attraction.latitude)
        .bind(attraction.longitude)
        .bind(&attraction.image)
        .bind(attraction.is_open)
        .bind(reset_approved)
        .bind(Utc::now())
        .bind(attraction.id)
        .execute(pool)
        .await
        .context("Failed to update attraction")?;
    Ok(())
}

async fn list_attractions_sqlite(
    pool: &SqlitePool,
    filter: &ListFilter,
    order: AttractionOrder,
    params: &ListParams,
) -> Result<(Vec<AttractionSummary>, i64)> {
    let count_sql = format!("SELECT COUNT(*) AS count FROM attractions a WHERE {}", FILTER_SQL);
    let total: i64 = bind_filter!(sqlx::query(&count_sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count attractions")?
        .get("count");

    let list_sql = format!(
        r#"
        SELECT {}, COALESCE(AVG(r.rating), 0.0) AS average_rating, COUNT(r.id) AS review_count
        FROM attractions a
        LEFT JOIN reviews r ON r.attraction_id = a.id
        WHERE {}
        GROUP BY a.id
        ORDER BY {}
        LIMIT ? OFFSET ?
        "#,
        ATTRACTION_COLUMNS,
        FILTER_SQL,
        order_sql(order)
    );
    let rows = bind_filter!(sqlx::query(&list_sql), filter)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list attractions")?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(AttractionSummary {
            attraction: row_to_attraction_sqlite(&row)?,
            average_rating: row.get("average_rating"),
            review_count: row.get("review_count"),
        });
    }

    Ok((items, total))
}

async fn set_status_bulk_sqlite(
    pool: &SqlitePool,
    ids: &[i64],
    status: AttractionStatus,
) -> Result<BulkStatusOutcome> {
    let now = Utc::now();
    let mut outcome = BulkStatusOutcome::default();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for &id in ids {
        let affected = sqlx::query(
            "UPDATE attractions SET status = ?, updated_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update attraction status")?
        .rows_affected();

        if affected > 0 {
            outcome.updated.push(id);
        } else {
            outcome.skipped.push(id);
        }
    }

    tx.commit().await.context("Failed to commit status change")?;
    Ok(outcome)
}

fn row_to_attraction_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Attraction> {
    let category: String = row.get("category");
    let status: String = row.get("status");

    Ok(Attraction {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        category: parse_category(&category)?,
        location: row.get("location"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        contributor_id: row.get("contributor_id"),
        image: row.get("image"),
        is_open: row.get("is_open"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_attraction_mysql(
    pool: &MySqlPool,
    input: &CreateAttractionInput,
) -> Result<Attraction> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO attractions (name, description, category, location, latitude, longitude,
                                 contributor_id, image, is_open, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.category.as_str())
    .bind(&input.location)
    .bind(input.latitude)
    .bind(input.longitude)
    .bind(input.contributor_id)
    .bind(&input.image)
    .bind(input.is_open)
    .bind(input.status.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create attraction")?;

    Ok(attraction_from_input(result.last_insert_id() as i64, input, now))
}

async fn update_attraction_mysql(
    pool: &MySqlPool,
    attraction: &Attraction,
    reset_approved: bool,
) -> Result<()> {
    sqlx::query(UPDATE_SQL)
        .bind(&attraction.name)
        .bind(&attraction.description)
        .bind(attraction.category.as_str())
        .bind(&attraction.location)
        .bind(attraction.latitude)
        .bind(attraction.longitude)
        .bind(&attraction.image)
        .bind(attraction.is_open)
        .bind(reset_approved)
        .bind(Utc::now())
        .bind(attraction.id)
        .execute(pool)
        .await
        .context("Failed to update attraction")?;
    Ok(())
}

async fn list_attractions_mysql(
    pool: &MySqlPool,
    filter: &ListFilter,
    order: AttractionOrder,
    params: &ListParams,
) -> Result<(Vec<AttractionSummary>, i64)> {
    let count_sql = format!("SELECT COUNT(*) AS count FROM attractions a WHERE {}", FILTER_SQL);
    let total: i64 = bind_filter!(sqlx::query(&count_sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count attractions")?
        .get("count");

    // AVG over INT is DECIMAL on MySQL
    let list_sql = format!(
        r#"
        SELECT {}, CAST(COALESCE(AVG(r.rating), 0) AS DOUBLE) AS average_rating,
               COUNT(r.id) AS review_count
        FROM attractions a
        LEFT JOIN reviews r ON r.attraction_id = a.id
        WHERE {}
        GROUP BY a.id
        ORDER BY {}
        LIMIT ? OFFSET ?
        "#,
        ATTRACTION_COLUMNS,
        FILTER_SQL,
        order_sql(order)
    );
    let rows = bind_filter!(sqlx::query(&list_sql), filter)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list attractions")?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(AttractionSummary {
            attraction: row_to_attraction_mysql(&row)?,
            average_rating: row.get("average_rating"),
            review_count: row.get("review_count"),
        });
    }

    Ok((items, total))
}

async fn set_status_bulk_mysql(
    pool: &MySqlPool,
    ids: &[i64],
    status: AttractionStatus,
) -> Result<BulkStatusOutcome> {
    let now = Utc::now();
    let mut outcome = BulkStatusOutcome::default();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for &id in ids {
        let affected = sqlx::query(
            "UPDATE attractions SET status = ?, updated_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update attraction status")?
        .rows_affected();

        if affected > 0 {
            outcome.updated.push(id);
        } else {
            outcome.skipped.push(id);
        }
    }

    tx.commit().await.context("Failed to commit status change")?;
    Ok(outcome)
}

fn row_to_attraction_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Attraction> {
    let category: String = row.get("category");
    let status: String = row.get("status");

    Ok(Attraction {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        category: parse_category(&category)?,
        location: row.get("location"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        contributor_id: row.get("contributor_id"),
        image: row.get("image"),
        is_open: row.get("is_open"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn attraction_from_input(
    id: i64,
    input: &CreateAttractionInput,
    now: chrono::DateTime<Utc>,
) -> Attraction {
    Attraction {
        id,
        name: input.name.clone(),
        description: input.description.clone(),
        category: input.category,
        location: input.location.clone(),
        latitude: input.latitude,
        longitude: input.longitude,
        contributor_id: input.contributor_id,
        image: input.image.clone(),
        is_open: input.is_open,
        status: input.status,
        created_at: now,
        updated_at: now,
    }
}
