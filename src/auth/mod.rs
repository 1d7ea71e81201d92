//! Authentication module.
//!
//! Password hashing, the role and folder access rules, and the first-start
//! administrator.

mod bootstrap;
mod password;
pub mod permission;

pub use bootstrap::ensure_admin;
pub use password::{hash_password, validate_password, verify_password, PasswordError};
pub use permission::{
    can_manage, can_view, require_admin, require_manage, require_view, Actor, PermissionError,
};
