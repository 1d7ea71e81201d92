//! API handlers.

pub mod auth;
pub mod docs;
pub mod file;
pub mod folder;
pub mod public;
pub mod stats;
pub mod user;

pub use auth::*;
pub use docs::{openapi_json, ApiDoc};
pub use file::*;
pub use folder::*;
pub use public::*;
pub use stats::*;
pub use user::*;
