//! cabinet - hierarchical file cabinet server.
//!
//! Folders nest into a tree with per-folder user grants and public sharing.
//! File content is kept in a blob store, metadata in SQLite, and everything is
//! served over a JWT-authenticated REST API. The [`client`] module talks to
//! that API and drives the admin and public explorers.

pub mod auth;
pub mod client;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod stats;
pub mod web;

pub use auth::{
    ensure_admin, hash_password, validate_password, verify_password, Actor, PasswordError,
    PermissionError,
};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository, UserUpdate};
pub use error::{CabinetError, Result};
