//! Role checks and folder access rules.
//!
//! Grants are stored per folder and are not inherited by subfolders.
//! Callers look up whether the acting user holds a grant on the folder in
//! question and pass the answer in; these functions only apply the rules.

use thiserror::Error;

use crate::db::{Role, User};
use crate::CabinetError;

/// Permission-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// The operation is reserved for administrators.
    #[error("administrator access required")]
    AdminRequired,

    /// The user may not view the folder.
    #[error("you do not have access to this folder")]
    ViewDenied,

    /// The user may view but not modify the folder.
    #[error("you are not allowed to manage this folder")]
    ManageDenied,
}

impl From<PermissionError> for CabinetError {
    fn from(e: PermissionError) -> Self {
        CabinetError::Permission(e.to_string())
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User ID.
    pub user_id: i64,
    /// Role at the time the request was authenticated.
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether the actor is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}

/// Whether a user may see a folder, list its files and download from it.
///
/// ```
/// use cabinet::auth::permission::can_view;
/// use cabinet::db::Role;
///
/// assert!(can_view(Role::Admin, false));
/// assert!(can_view(Role::Basic, true));
/// assert!(!can_view(Role::Manager, false));
/// ```
pub fn can_view(role: Role, granted: bool) -> bool {
    role == Role::Admin || granted
}

/// Whether a user may modify a folder, its files and its grant set.
///
/// ```
/// use cabinet::auth::permission::can_manage;
/// use cabinet::db::Role;
///
/// assert!(can_manage(Role::Admin, false));
/// assert!(can_manage(Role::Manager, true));
/// assert!(!can_manage(Role::Basic, true));
/// ```
pub fn can_manage(role: Role, granted: bool) -> bool {
    role == Role::Admin || (role == Role::Manager && granted)
}

/// Require the administrator role.
pub fn require_admin(role: Role) -> Result<(), PermissionError> {
    if role == Role::Admin {
        Ok(())
    } else {
        Err(PermissionError::AdminRequired)
    }
}

/// Require view access to a folder.
pub fn require_view(role: Role, granted: bool) -> Result<(), PermissionError> {
    if can_view(role, granted) {
        Ok(())
    } else {
        Err(PermissionError::ViewDenied)
    }
}

/// Require manage access to a folder.
pub fn require_manage(role: Role, granted: bool) -> Result<(), PermissionError> {
    if can_manage(role, granted) {
        Ok(())
    } else {
        Err(PermissionError::ManageDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_bypasses_grants() {
        assert!(can_view(Role::Admin, false));
        assert!(can_manage(Role::Admin, false));
        assert!(require_admin(Role::Admin).is_ok());
    }

    #[test]
    fn test_manager_needs_grant() {
        assert!(can_view(Role::Manager, true));
        assert!(can_manage(Role::Manager, true));
        assert!(!can_view(Role::Manager, false));
        assert!(!can_manage(Role::Manager, false));
        assert_eq!(
            require_admin(Role::Manager),
            Err(PermissionError::AdminRequired)
        );
    }

    #[test]
    fn test_basic_is_read_only() {
        assert!(can_view(Role::Basic, true));
        assert!(!can_manage(Role::Basic, true));
        assert_eq!(
            require_manage(Role::Basic, true),
            Err(PermissionError::ManageDenied)
        );
        assert_eq!(
            require_view(Role::Basic, false),
            Err(PermissionError::ViewDenied)
        );
    }

    #[test]
    fn test_actor_from_user() {
        let user = User {
            id: 7,
            username: "mia".to_string(),
            password: "hash".to_string(),
            role: Role::Manager,
            created_at: "2024-01-01 00:00:00".to_string(),
            last_login: None,
        };
        let actor = Actor::from(&user);
        assert_eq!(actor, Actor::new(7, Role::Manager));
        assert!(!actor.is_admin());
    }

    #[test]
    fn test_permission_error_into_cabinet_error() {
        let err: CabinetError = PermissionError::AdminRequired.into();
        assert!(matches!(err, CabinetError::Permission(_)));
        assert_eq!(
            err.to_string(),
            "permission denied: administrator access required"
        );
    }
}
