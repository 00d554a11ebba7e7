//! Database connection pool abstraction
//!
//! This module provides a unified interface for database operations that works
//! with both SQLite and MySQL backends. The appropriate pool is created based
//! on the configuration (a `mysql://` DATABASE_URL or the local SQLite file).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Database pool trait that abstracts over different database backends.
///
/// This trait provides a unified interface for database operations,
/// allowing the application to work with either SQLite or MySQL
/// without knowing the specific backend.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a raw SQL query that doesn't return rows
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Check if the database connection is healthy
    async fn ping(&self) -> Result<()>;

    /// Get the database driver type
    fn driver(&self) -> DatabaseDriver;

    /// Get the underlying SQLite pool if this is a SQLite connection
    fn as_sqlite(&self) -> Option<&SqlitePool>;

    /// Get the underlying MySQL pool if this is a MySQL connection
    fn as_mysql(&self) -> Option<&MySqlPool>;
}

impl dyn DatabasePool {
    /// The SQLite pool, or an error when the driver says otherwise
    pub fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite()
            .context("Database driver is SQLite but no SQLite pool is available")
    }

    /// The MySQL pool, or an error when the driver says otherwise
    pub fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql()
            .context("Database driver is MySQL but no MySQL pool is available")
    }
}

/// SQLite connection pool implementation
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Create a new SQLite connection pool
    pub async fn new(url: &str) -> Result<Self> {
        // Ensure the database directory exists for file-based SQLite
        if !url.starts_with(":memory:") && !url.starts_with("sqlite::memory:") {
            // Extract the path from the URL
            let path = if url.starts_with("sqlite:") {
                url.trim_start_matches("sqlite:")
            } else {
                url
            };

            // Create parent directory if it doesn't exist
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| {
                            format!("Failed to create database directory: {:?}", parent)
                        })?;
                }
            }
        }

        // Build the connection URL with create=true for file-based databases
        let connection_url = if url.starts_with("sqlite:") {
            // If it already has options, don't modify
            if url.contains('?') {
                url.to_string()
            } else {
                format!("{}?mode=rwc", url)
            }
        } else if url == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            // File path - add sqlite: prefix and create mode
            format!("sqlite:{}?mode=rwc", url)
        };

        let options = SqliteConnectOptions::from_str(&connection_url)
            .with_context(|| format!("Invalid SQLite database URL: {}", url))?
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so keep exactly one alive
        let pool_options = if connection_url.starts_with("sqlite::memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(20)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

/// MySQL connection pool implementation
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Create a new MySQL connection pool
    pub async fn new(url: &str) -> Result<Self> {
        // Build the connection URL
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

/// Type alias for a boxed database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Create a database connection pool based on configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
///
/// # Example
///
/// ```ignore
/// use city_guide::config::DatabaseConfig;
/// use city_guide::db::create_pool;
///
/// let config = DatabaseConfig::default();
/// let pool = create_pool(&config).await?;
/// pool.ping().await?;
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    match config.driver {
        DatabaseDriver::Sqlite => {
            let db = SqliteDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
        DatabaseDriver::Mysql => {
            let db = MysqlDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
    }
}

/// Create a SQLite in-memory database pool for testing
///
/// This is a convenience function for creating an in-memory SQLite database,
/// useful for unit tests and integration tests.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
