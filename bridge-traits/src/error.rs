use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Transient transport failure: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts, connection failures, rate limiting and 5xx responses are
    /// reported as `Transient` by the HTTP bridge.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
