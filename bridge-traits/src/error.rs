use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network unavailable: {0}")]
    Network(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same operation may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
