//! Refresh token repository for JWT authentication.

use sqlx::SqlitePool;

use crate::{CabinetError, Result};

/// Refresh token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    /// Token ID.
    pub id: i64,
    /// User ID.
    pub user_id: i64,
    /// Token string.
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Revocation timestamp (None if not revoked).
    pub revoked_at: Option<String>,
}

/// New refresh token for creation.
pub struct NewRefreshToken {
    /// User ID.
    pub user_id: i64,
    /// Token string.
    pub token: String,
    /// Expiration timestamp (`YYYY-MM-DD HH:MM:SS`, UTC).
    pub expires_at: String,
}

const TOKEN_COLUMNS: &str = "id, user_id, token, expires_at, created_at, revoked_at";

/// Repository for refresh token operations.
pub struct RefreshTokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RefreshTokenRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new refresh token.
    pub async fn create(&self, new_token: &NewRefreshToken) -> Result<RefreshToken> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(new_token.user_id)
        .bind(&new_token.token)
        .bind(&new_token.expires_at)
        .fetch_one(self.pool)
        .await?;

        sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| CabinetError::NotFound("refresh token".to_string()))
    }

    /// Look up a token regardless of state.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let result = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token = ?"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(result)
    }

    /// Get a token that is neither expired nor revoked.
    pub async fn get_valid_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let result = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens
             WHERE token = ? AND revoked_at IS NULL AND expires_at > datetime('now')"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(result)
    }

    /// Revoke a token. Returns false if it was unknown or already revoked.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(token)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live token of a user.
    pub async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = datetime('now')
             WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired and revoked tokens.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens
             WHERE expires_at < datetime('now') OR revoked_at IS NOT NULL",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
            .bind("tester")
            .bind("hashedpassword")
            .execute(db.pool())
            .await
            .unwrap();
        db
    }

    fn token(name: &str, expires_at: &str) -> NewRefreshToken {
        NewRefreshToken {
            user_id: 1,
            token: name.to_string(),
            expires_at: expires_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());

        let created = repo.create(&token("abc", "2099-12-31 23:59:59")).await.unwrap();
        assert_eq!(created.user_id, 1);
        assert!(created.revoked_at.is_none());

        assert!(repo.get_by_token("abc").await.unwrap().is_some());
        assert!(repo.get_by_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_valid() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token("live", "2099-12-31 23:59:59")).await.unwrap();
        repo.create(&token("dead", "2000-01-01 00:00:00")).await.unwrap();

        assert!(repo.get_valid_token("live").await.unwrap().is_some());
        assert!(repo.get_valid_token("dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token("revoke-me", "2099-12-31 23:59:59")).await.unwrap();

        assert!(repo.revoke("revoke-me").await.unwrap());
        assert!(!repo.revoke("revoke-me").await.unwrap());
        assert!(repo.get_valid_token("revoke-me").await.unwrap().is_none());

        let stored = repo.get_by_token("revoke-me").await.unwrap().unwrap();
        assert!(stored.revoked_at.is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_and_cleanup() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        for i in 0..3 {
            repo.create(&token(&format!("t{i}"), "2099-12-31 23:59:59"))
                .await
                .unwrap();
        }
        repo.create(&token("old", "2000-01-01 00:00:00")).await.unwrap();

        assert_eq!(repo.revoke_all_for_user(1).await.unwrap(), 4);
        assert_eq!(repo.cleanup_expired().await.unwrap(), 4);
        assert!(repo.get_by_token("t0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tokens_removed_with_user() {
        let db = setup_db().await;
        let repo = RefreshTokenRepository::new(db.pool());
        repo.create(&token("abc", "2099-12-31 23:59:59")).await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = 1")
            .execute(db.pool())
            .await
            .unwrap();
        assert!(repo.get_by_token("abc").await.unwrap().is_none());
    }
}
