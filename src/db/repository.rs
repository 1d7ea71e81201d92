//! User repository.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::user::{NewUser, Role, User, UserUpdate};
use crate::{CabinetError, Result};

const USER_COLUMNS: &str = "id, username, password, role, created_at, last_login";

/// Filter for paginated user listings.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring of the username.
    pub username: Option<String>,
}

impl UserFilter {
    fn pattern(&self) -> Option<String> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` clause.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// A duplicate username yields `CabinetError::Conflict`.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        if self.username_exists(&new_user.username).await? {
            return Err(CabinetError::Conflict(format!(
                "username '{}' is already taken",
                new_user.username
            )));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password, role) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(new_user.role.as_str())
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| CabinetError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Update a user. Returns the updated user, or None if not found.
    ///
    /// Renaming onto an existing username yields `CabinetError::Conflict`.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        if let Some(ref username) = update.username {
            if let Some(existing) = self.get_by_username(username).await? {
                if existing.id != id {
                    return Err(CabinetError::Conflict(format!(
                        "username '{username}' is already taken"
                    )));
                }
            }
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref username) = update.username {
            separated.push("username = ");
            separated.push_bind_unseparated(username);
        }
        if let Some(ref password) = update.password {
            separated.push("password = ");
            separated.push_bind_unseparated(password);
        }
        if let Some(role) = update.role {
            separated.push("role = ");
            separated.push_bind_unseparated(role.as_str());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Record a successful login.
    pub async fn update_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a user. Grants and refresh tokens go with it; folders and files
    /// they created keep existing with `created_by` cleared.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Page through users ordered by username.
    pub async fn list(&self, filter: &UserFilter, offset: i64, limit: i64) -> Result<Vec<User>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(pattern) = filter.pattern() {
            query.push(" WHERE username LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\'");
        }
        query.push(" ORDER BY username COLLATE NOCASE LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let users = query.build_query_as::<User>().fetch_all(self.pool).await?;
        Ok(users)
    }

    /// Count users matching a filter.
    pub async fn count(&self, filter: &UserFilter) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        if let Some(pattern) = filter.pattern() {
            query.push(" WHERE username LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\'");
        }
        let count: i64 = query.build_query_scalar::<i64>().fetch_one(self.pool).await?;
        Ok(count)
    }

    /// Users with the given role.
    pub async fn list_by_role(&self, role: Role) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY id"
        ))
        .bind(role.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }

    /// IDs from `ids` that do not belong to any user.
    pub async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut missing = Vec::new();
        for &id in ids {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
            if !exists {
                missing.push(id);
            }
        }
        Ok(missing)
    }

    /// Check if a username is already taken (case-insensitive).
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ? COLLATE NOCASE)")
                .bind(username)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }
}
