use anyhow::{Context, Result};

use super::schema::Database;
use crate::catalog::Item;

impl Database {
    // ========================================================================
    // Favourites Operations
    // ========================================================================

    /// Store a favourite for `user_id`.
    ///
    /// The item is saved as a JSON snapshot. Adding an item that is already
    /// stored is a no-op and keeps its original position.
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted.
    pub async fn add_favourite(&self, user_id: &str, item: &Item) -> Result<bool> {
        let snapshot = serde_json::to_string(item).context("Failed to encode favourite")?;
        let result = sqlx::query(
            r#"
            INSERT INTO favourites (user_id, item_id, snapshot, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, item_id) DO NOTHING
        "#,
        )
        .bind(user_id)
        .bind(item.id as i64)
        .bind(&snapshot)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a favourite by item id. Returns `true` if a row was removed.
    pub async fn remove_favourite(&self, user_id: &str, item_id: u64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favourites WHERE user_id = ? AND item_id = ?")
            .bind(user_id)
            .bind(item_id as i64)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All favourites for `user_id`, oldest first.
    ///
    /// Rows whose snapshot no longer decodes are skipped with a warning.
    pub async fn get_favourites(&self, user_id: &str) -> Result<Vec<Item>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT item_id, snapshot FROM favourites WHERE user_id = ? ORDER BY seq",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .filter_map(|(item_id, snapshot)| match serde_json::from_str::<Item>(&snapshot) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(item_id = item_id, error = %e, "Skipping unreadable favourite");
                    None
                }
            })
            .collect();

        Ok(items)
    }

    pub async fn clear_favourites(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM favourites WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
