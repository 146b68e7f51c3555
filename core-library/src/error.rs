use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

use crate::rules::RuleIssue;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid album rules: {}", format_issues(.0))]
    InvalidRules(Vec<RuleIssue>),

    #[error("No usable capture time in the metadata of {path}; add EXIF:DateTimeOriginal to the file")]
    MissingCaptureTime { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

impl LibraryError {
    /// Whether the error comes from the album configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LibraryError::Config(_) | LibraryError::InvalidRules(_) | LibraryError::Runtime(_)
        )
    }
}

fn format_issues(issues: &[RuleIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, LibraryError>;
