//! Database connection pool and initialization.

use std::path::PathBuf;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::error::{DbError, DbResult};

/// Database pool wrapper
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: SqlitePool,
}

impl DbPool {
    /// Initialize the database: ensure the data directory exists, connect,
    /// and run migrations.
    pub async fn new() -> DbResult<Self> {
        let db_path = Self::db_path()?;
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = Self::create_pool(&db_path).await?;
        Self::run_migrations(&pool).await?;

        info!("Database initialized");
        Ok(Self { pool })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    pub fn db_path() -> DbResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(DbError::NoConfigDir)?;
        Ok(data_dir.join("paddock").join("paddock.sqlite3"))
    }

    async fn create_pool(db_path: &std::path::Path) -> DbResult<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // WAL mode for better concurrent read performance
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;

        Ok(pool)
    }

    /// Run database migrations
    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        let migration_sql = include_str!("../migrations/001_initial_schema.sql");

        for statement in migration_sql.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(pool).await.map_err(|e| {
                    DbError::Migration(format!("Failed to execute migration: {}", e))
                })?;
            }
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Test helpers
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Create an in-memory database for testing
    pub async fn create_test_pool() -> DbResult<DbPool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        let migration_sql = include_str!("../migrations/001_initial_schema.sql");
        for statement in migration_sql.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&pool).await?;
            }
        }

        Ok(DbPool { pool })
    }
}
