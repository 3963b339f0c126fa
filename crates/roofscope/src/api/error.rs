use thiserror::Error;

/// Transport-level failures, normalized before they reach the controller.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Network or HTTP failure not otherwise classified.
    #[error("Request failed: {0}")]
    Request(String),

    /// A direct-to-storage upload failed at the transport layer (the
    /// cross-origin/network-block class). Signals the caller to retry
    /// through the API instead of surfacing to the user.
    #[error("Direct upload blocked: {0}")]
    UploadBlocked(String),
}

impl ApiError {
    pub fn message(&self) -> &str {
        match self {
            ApiError::Request(message) | ApiError::UploadBlocked(message) => message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
