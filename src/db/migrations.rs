//! Database migrations module
//!
//! Code-based database migrations for the city guide. All migrations are
//! embedded directly in Rust code as SQL strings, supporting both SQLite and
//! MySQL databases.
//!
//! # Usage
//!
//! ```ignore
//! use city_guide::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Each migration is defined as a `Migration` struct containing:
//! - `version`: Unique version number for ordering
//! - `name`: Human-readable migration name
//! - `up_sqlite`: SQL for SQLite database
//! - `up_mysql`: SQL for MySQL database

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    /// Migration version number
    pub version: i64,
    /// Migration name/description
    pub name: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

/// All migrations, embedded in the binary.
pub const MIGRATIONS: &[Migration] = &[
    // Usernames and emails compare case-insensitively on both drivers
    // (NOCASE on SQLite, the default collation on MySQL).
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE COLLATE NOCASE,
                email VARCHAR(254) NOT NULL UNIQUE COLLATE NOCASE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'member',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'member',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    // Contributors may be deleted; their attractions stay with no contributor.
    Migration {
        version: 3,
        name: "create_attractions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS attractions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(150) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                category VARCHAR(20) NOT NULL DEFAULT 'NATURE',
                location VARCHAR(255) NOT NULL,
                latitude REAL NOT NULL DEFAULT 7.0686,
                longitude REAL NOT NULL DEFAULT 125.6063,
                contributor_id INTEGER,
                image VARCHAR(255),
                is_open BOOLEAN NOT NULL DEFAULT 1,
                status VARCHAR(10) NOT NULL DEFAULT 'PENDING',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (contributor_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attractions_status ON attractions(status);
            CREATE INDEX IF NOT EXISTS idx_attractions_category ON attractions(category);
            CREATE INDEX IF NOT EXISTS idx_attractions_contributor ON attractions(contributor_id);
            CREATE INDEX IF NOT EXISTS idx_attractions_created_at ON attractions(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS attractions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(150) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                category VARCHAR(20) NOT NULL DEFAULT 'NATURE',
                location VARCHAR(255) NOT NULL,
                latitude DOUBLE NOT NULL DEFAULT 7.0686,
                longitude DOUBLE NOT NULL DEFAULT 125.6063,
                contributor_id BIGINT NULL,
                image VARCHAR(255) NULL,
                is_open BOOLEAN NOT NULL DEFAULT TRUE,
                status VARCHAR(10) NOT NULL DEFAULT 'PENDING',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (contributor_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_attractions_status ON attractions(status);
            CREATE INDEX idx_attractions_category ON attractions(category);
            CREATE INDEX idx_attractions_contributor ON attractions(contributor_id);
            CREATE INDEX idx_attractions_created_at ON attractions(created_at);
        "#,
    },
    // One review per (attraction, user); reviews go away with either side.
    Migration {
        version: 4,
        name: "create_reviews",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                attraction_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (attraction_id, user_id),
                FOREIGN KEY (attraction_id) REFERENCES attractions(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_reviews_attraction_created
                ON reviews(attraction_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                attraction_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                rating INT NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment VARCHAR(500) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_reviews_attraction_user (attraction_id, user_id),
                FOREIGN KEY (attraction_id) REFERENCES attractions(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_reviews_attraction_created ON reviews(attraction_id, created_at);
            CREATE INDEX idx_reviews_user ON reviews(user_id);
        "#,
    },
];

/// Run all pending migrations
///
/// Creates the `_migrations` tracking table if needed, then applies every
/// migration whose version hasn't been recorded yet, in order.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    // Create migrations table
    create_migrations_table(pool).await?;

    // Get applied migrations
    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_migrations_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Mysql => get_applied_migrations_mysql(pool.mysql()?).await,
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows =
        sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(pool)
            .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Mysql => apply_migration_mysql(pool.mysql()?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_sqlite) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    // Execute migration SQL (may contain multiple statements)
    for statement in split_sql_statements(migration.up_mysql) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    // Record the migration
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, handling comments properly
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    // Handle last statement without trailing semicolon
    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    for line in s.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("--") {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str, email: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind("hash")
            .bind("member")
            .execute(pool)
            .await
            .expect("Failed to insert user")
            .last_insert_rowid()
    }

    async fn insert_attraction(pool: &SqlitePool, name: &str, contributor_id: Option<i64>) -> i64 {
        sqlx::query(
            "INSERT INTO attractions (name, description, location, contributor_id) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind("A place")
        .bind("Downtown")
        .bind(contributor_id)
        .execute(pool)
        .await
        .expect("Failed to insert attraction")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_attraction_defaults() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        let id = insert_attraction(sqlite, "Eagle Center", None).await;

        let row = sqlx::query("SELECT category, status, is_open, latitude, longitude FROM attractions WHERE id = ?")
            .bind(id)
            .fetch_one(sqlite)
            .await
            .expect("Failed to fetch attraction");

        let category: String = row.get("category");
        let status: String = row.get("status");
        let is_open: bool = row.get("is_open");
        let latitude: f64 = row.get("latitude");
        let longitude: f64 = row.get("longitude");
        assert_eq!(category, "NATURE");
        assert_eq!(status, "PENDING");
        assert!(is_open);
        assert!((latitude - 7.0686).abs() < 1e-9);
        assert!((longitude - 125.6063).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_attraction_name_unique() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        insert_attraction(sqlite, "People's Park", None).await;

        let result = sqlx::query("INSERT INTO attractions (name, description, location) VALUES (?, ?, ?)")
            .bind("People's Park")
            .bind("Again")
            .bind("Downtown")
            .execute(sqlite)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_contributor_deleted_sets_null() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        let user_id = insert_user(sqlite, "alice", "alice@example.com").await;
        let attraction_id = insert_attraction(sqlite, "Crocodile Park", Some(user_id)).await;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(sqlite)
            .await
            .expect("Failed to delete user");

        let row = sqlx::query("SELECT contributor_id FROM attractions WHERE id = ?")
            .bind(attraction_id)
            .fetch_one(sqlite)
            .await
            .expect("Attraction should survive its contributor");
        let contributor: Option<i64> = row.get("contributor_id");
        assert!(contributor.is_none());
    }

    #[tokio::test]
    async fn test_reviews_constraints() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        let user_id = insert_user(sqlite, "bob", "bob@example.com").await;
        let attraction_id = insert_attraction(sqlite, "Mount Apo", None).await;

        let insert = |rating: i64| {
            sqlx::query("INSERT INTO reviews (attraction_id, user_id, rating, comment) VALUES (?, ?, ?, ?)")
                .bind(attraction_id)
                .bind(user_id)
                .bind(rating)
                .bind("Lovely hike to the top")
        };

        // Rating outside 1..=5 is rejected by the CHECK constraint
        assert!(insert(6).execute(sqlite).await.is_err());
        assert!(insert(5).execute(sqlite).await.is_ok());
        // Second review by the same user violates UNIQUE(attraction_id, user_id)
        assert!(insert(4).execute(sqlite).await.is_err());
    }

    #[tokio::test]
    async fn test_attraction_delete_cascades_reviews() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        let user_id = insert_user(sqlite, "carol", "carol@example.com").await;
        let attraction_id = insert_attraction(sqlite, "Eden Nature Park", None).await;

        sqlx::query("INSERT INTO reviews (attraction_id, user_id, rating, comment) VALUES (?, ?, ?, ?)")
            .bind(attraction_id)
            .bind(user_id)
            .bind(4)
            .bind("Cool weather all day")
            .execute(sqlite)
            .await
            .expect("Failed to insert review");

        sqlx::query("DELETE FROM attractions WHERE id = ?")
            .bind(attraction_id)
            .execute(sqlite)
            .await
            .expect("Failed to delete attraction");

        let row = sqlx::query("SELECT COUNT(*) as count FROM reviews")
            .fetch_one(sqlite)
            .await
            .expect("Failed to count reviews");
        let count: i64 = row.get("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_username_unique_ignores_case() {
        let pool = migrated_pool().await;
        let sqlite = pool.sqlite().unwrap();
        insert_user(sqlite, "Dana", "dana@example.com").await;

        let result = sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
            .bind("dana")
            .bind("other@example.com")
            .bind("hash")
            .execute(sqlite)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_migration_versions_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1);
        }
        assert_eq!(MIGRATIONS.len(), 4);
        assert_eq!(MIGRATIONS[0].name, "create_users");
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);";
        let statements = split_sql_statements(sql_with_comments);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
