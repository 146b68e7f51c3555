//! Error types for Google Photos provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Photos provider errors
#[derive(Error, Debug)]
pub enum GooglePhotosError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Photos API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

impl GooglePhotosError {
    /// Throttling and server errors may succeed on another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            GooglePhotosError::ApiError { status_code, .. } => {
                *status_code == 429 || (500..600).contains(status_code)
            }
            GooglePhotosError::BridgeError(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for Google Photos operations
pub type Result<T> = std::result::Result<T, GooglePhotosError>;

impl From<GooglePhotosError> for BridgeError {
    fn from(error: GooglePhotosError) -> Self {
        if error.is_transient() {
            return match error {
                GooglePhotosError::BridgeError(e) => e,
                other => BridgeError::Transient(other.to_string()),
            };
        }

        match error {
            GooglePhotosError::AuthenticationFailed(msg) => BridgeError::OperationFailed(format!(
                "Authentication failed: {}; check GOOGLE_PHOTOS_ACCESS_TOKEN",
                msg
            )),
            GooglePhotosError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            GooglePhotosError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GooglePhotosError::BridgeError(e) => e,
        }
    }
}
