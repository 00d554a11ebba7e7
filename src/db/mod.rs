//! Database layer
//!
//! This module provides database abstraction for the city guide.
//! It supports:
//! - SQLite (default, a local file next to the binary)
//! - MySQL (selected by a `mysql://` DATABASE_URL)
//!
//! # Architecture
//!
//! The database layer uses a trait-based abstraction (`DatabasePool`) that
//! allows the application to work with either SQLite or MySQL without
//! knowing the specific backend. Repositories dispatch on
//! [`DatabasePool::driver`] to per-driver query functions.
//!
//! # Usage
//!
//! ```ignore
//! use city_guide::config::DatabaseConfig;
//! use city_guide::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether an error chain contains a UNIQUE constraint violation.
///
/// Repositories wrap sqlx errors with context, so the whole chain is searched.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}
