use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database, as used by tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another instance holds the
    /// database lock, `DatabaseError::Migration` if the schema could not be
    /// applied, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // The session table holds identity tokens: create the file owner-only.
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "Failed to set database file permissions");
                }
            } else if db_path.parent().is_some_and(|p| p.exists()) {
                // Creation errors resurface from connect_with below.
                let _ = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path);
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if DatabaseError::is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Database ready");
        Ok(db)
    }

    /// Apply the schema inside one transaction. Every statement is
    /// `IF NOT EXISTS`, so re-running on an existing database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Favourites keep insertion order through `seq`; re-adding an item
        // leaves its original position.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favourites (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                snapshot TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                UNIQUE(user_id, item_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_favourites_user ON favourites(user_id, seq)")
            .execute(&mut *tx)
            .await?;

        // At most one signed-in session per database.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id TEXT NOT NULL,
                display_name TEXT,
                email TEXT,
                is_anonymous INTEGER NOT NULL DEFAULT 0,
                id_token TEXT NOT NULL,
                refresh_token TEXT,
                created_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
