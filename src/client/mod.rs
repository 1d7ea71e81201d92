//! Typed client for the cabinet API and the explorer state built on it.

mod api;
mod explorer;

pub use api::{
    AdminApi, ApiClient, ClientError, ClientResult, PublicApi, UploadFile, UserChanges,
};
pub use explorer::{AdminExplorer, FolderSummary, PublicExplorer, SelectedUser, UserSelection};
