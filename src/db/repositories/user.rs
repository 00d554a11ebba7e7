//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Username and email lookups are case-insensitive: the columns use a
//! case-insensitive collation on both drivers.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update email, password hash and role
    async fn update(&self, user: &User) -> Result<User>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &str, value: UserKey<'_>) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let query = sqlx::query(&sql);
                let query = match value {
                    UserKey::Id(id) => query.bind(id),
                    UserKey::Text(text) => query.bind(text),
                };
                let row = query
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .with_context(|| format!("Failed to get user by {}", column))?;
                row.map(|row| row_to_user_sqlite(&row)).transpose()
            }
            DatabaseDriver::Mysql => {
                let query = sqlx::query(&sql);
                let query = match value {
                    UserKey::Id(id) => query.bind(id),
                    UserKey::Text(text) => query.bind(text),
                };
                let row = query
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .with_context(|| format!("Failed to get user by {}", column))?;
                row.map(|row| row_to_user_mysql(&row)).transpose()
            }
        }
    }
}

enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        self.find_one("id", UserKey::Id(id)).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_one("username", UserKey::Text(username)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", UserKey::Text(email)).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql =
            "UPDATE users SET email = ?, password_hash = ?, role = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.to_string())
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(user.role.to_string())
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update user")?;
            }
        }

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
