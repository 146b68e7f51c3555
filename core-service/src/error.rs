use bridge_traits::error::BridgeError;
use core_library::RuleIssue;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error(
        "Album mapping {} has {} problem(s); edit the file and try again",
        .path.display(),
        .issues.len()
    )]
    InvalidAlbumMapping { path: PathBuf, issues: Vec<RuleIssue> },

    #[error("Album(s) not configured in {}: {}", .path.display(), .names.join(", "))]
    UnknownAlbums { path: PathBuf, names: Vec<String> },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl ServiceError {
    /// Configuration and input-data errors, as opposed to remote failures
    pub fn is_config_error(&self) -> bool {
        match self {
            ServiceError::InvalidAlbumMapping { .. }
            | ServiceError::UnknownAlbums { .. }
            | ServiceError::Runtime(_) => true,
            ServiceError::Library(e) => e.is_config_error(),
            ServiceError::Sync(core_sync::SyncError::Library(e)) => e.is_config_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
