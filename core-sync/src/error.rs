use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote service error: {0}")]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("Invalid run phase transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Photo {short_path} has no local file to upload")]
    MissingLocalFile { short_path: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
