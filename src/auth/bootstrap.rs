//! First-start administrator account.

use crate::config::AdminConfig;
use crate::db::{NewUser, Role, User, UserFilter, UserRepository};
use crate::{CabinetError, Database, Result};

use super::password::hash_password;

/// Create the configured administrator when the user table is empty.
///
/// Returns the new account, or `None` when users already exist.
pub async fn ensure_admin(db: &Database, admin: &AdminConfig) -> Result<Option<User>> {
    let repo = UserRepository::new(db.pool());
    if repo.count(&UserFilter::default()).await? > 0 {
        return Ok(None);
    }

    if admin.password.is_empty() {
        return Err(CabinetError::Config(
            "no users exist and admin.password is not set. \
             Set it in config.toml or via CABINET_ADMIN_PASSWORD."
                .to_string(),
        ));
    }

    let hash = hash_password(&admin.password)
        .map_err(|e| CabinetError::Config(format!("admin.password rejected: {e}")))?;
    let user = repo
        .create(&NewUser::new(admin.username.trim(), hash).with_role(Role::Admin))
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "Created initial administrator");

    Ok(Some(user))
}
