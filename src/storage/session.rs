use anyhow::Result;

use super::schema::Database;
use super::types::StoredSession;

impl Database {
    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Replace the stored session.
    pub async fn save_session(&self, session: &StoredSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session (id, user_id, display_name, email, is_anonymous, id_token, refresh_token, created_at)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                display_name = excluded.display_name,
                email = excluded.email,
                is_anonymous = excluded.is_anonymous,
                id_token = excluded.id_token,
                refresh_token = excluded.refresh_token,
                created_at = excluded.created_at
        "#,
        )
        .bind(&session.user_id)
        .bind(&session.display_name)
        .bind(&session.email)
        .bind(session.is_anonymous)
        .bind(&session.id_token)
        .bind(&session.refresh_token)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_session(&self) -> Result<Option<StoredSession>> {
        let session = sqlx::query_as::<_, StoredSession>(
            r#"
            SELECT user_id, display_name, email, is_anonymous, id_token, refresh_token, created_at
            FROM session WHERE id = 1
        "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Forget the stored session. Returns `true` if one existed.
    pub async fn clear_session(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
