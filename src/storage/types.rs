use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of fakeflix appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, mapping SQLite lock failures to `InstanceLocked`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if Self::is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }

    // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
    pub(crate) fn is_lock_message(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// The persisted signed-in session.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StoredSession {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_anonymous: bool,
    pub id_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("is_anonymous", &self.is_anonymous)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_messages_detected() {
        assert!(DatabaseError::is_lock_message("error returned from database: database is locked"));
        assert!(DatabaseError::is_lock_message("SQLITE_BUSY"));
        assert!(!DatabaseError::is_lock_message("no such table: favourites"));
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let session = StoredSession {
            user_id: "u1".into(),
            display_name: None,
            email: None,
            is_anonymous: true,
            id_token: "secret-id-token".into(),
            refresh_token: Some("secret-refresh".into()),
            created_at: 0,
        };
        let out = format!("{:?}", session);
        assert!(!out.contains("secret"));
    }
}
