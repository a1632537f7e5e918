//! Database connection pool management
//!
//! Wraps SQLx's SqlitePool for the ledger database:
//! - Parent directories of the ledger file are created on demand
//! - WAL journal mode and enforced foreign keys
//! - The schema is applied on every open (statements are idempotent)
//! - In-memory mode for tests

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/0001_initial.sql");

/// Pool of SQLite connections to the ledger
///
/// File-backed pools allow a few concurrent readers; writers serialize on
/// SQLite's lock with a 5-second busy timeout. In-memory pools hold exactly
/// one connection because each connection would otherwise see its own
/// empty database.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the ledger at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the file cannot be opened,
    /// or `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create ledger directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open ledger at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::apply_schema(&pool).await?;

        tracing::info!(path = %db_path.display(), "Ledger database opened");

        Ok(Self { pool })
    }

    /// Creates an empty in-memory ledger
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory ledger: {}", e))
            })?;

        sqlx::raw_sql("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to enable foreign keys: {}", e))
            })?;

        Self::apply_schema(&pool).await?;

        tracing::debug!("In-memory ledger initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(SCHEMA).execute(pool).await.map_err(|e| {
            CacheError::MigrationFailed(format!("Failed to apply ledger schema: {}", e))
        })?;

        tracing::debug!("Ledger schema applied");
        Ok(())
    }
}
