use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database shared by every
    /// connection of the pool.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock, `DatabaseError::Migration` if the schema could not be
    /// created, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout lets a writer wait out the fetch worker instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Create the schema inside one transaction. Every statement is
    /// `IF NOT EXISTS`, so re-running on an existing database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                display_sequence INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS connectors (
                id INTEGER PRIMARY KEY,
                type INTEGER NOT NULL,
                subscribe_url TEXT,
                name TEXT,
                icon_url TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                crawl_full_content INTEGER NOT NULL DEFAULT 0,
                display_sequence INTEGER NOT NULL DEFAULT 1,
                folder_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
                fetch_interval_seconds INTEGER,
                inbox_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_fetched INTEGER,
                error TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // NULL subscribe_url (capture sources) never collides in a SQLite UNIQUE index
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_connectors_type_url ON connectors(type, subscribe_url)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY,
                connector_id INTEGER REFERENCES connectors(id),
                folder_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
                guid TEXT NOT NULL,
                url TEXT,
                title TEXT NOT NULL,
                description TEXT,
                content TEXT,
                author TEXT,
                published INTEGER,
                fetched_at INTEGER NOT NULL,
                UNIQUE(connector_id, guid)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_connector ON pages(connector_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_folder ON pages(folder_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pages_connector_published ON pages(connector_id, published DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Key-value store for global settings. Keys use dotted names: proxy.host, proxy.port
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS global_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
