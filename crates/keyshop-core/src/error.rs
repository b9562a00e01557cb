//! Error Types

use thiserror::Error;

/// Result type alias for storefront operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storefront error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Remote API answered with a non-2xx status
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Remote API could not be reached
    #[error("Remote API unavailable: {0}")]
    Unavailable(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials rejected or no session
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Caller passed arguments that can never succeed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Payload had an unexpected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local persistence store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Io(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => format!("The store service rejected the request: {message}"),
            Self::Unavailable(_) => "The store service is currently unavailable. Please try again.".into(),
            Self::NotFound(what) => format!("{what} was not found."),
            Self::InvalidInput(reason) => reason.clone(),
            Self::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            Self::Storage(_) | Self::Io(_) => "Local data could not be saved.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = StoreError::Api { status: 503, message: "busy".into() };
        assert!(err.is_retryable());

        let err = StoreError::Api { status: 404, message: "gone".into() };
        assert!(!err.is_retryable());
        assert!(StoreError::Unavailable("timeout".into()).is_retryable());
    }

    #[test]
    fn test_io_and_json_errors_convert() {
        let io = StoreError::from(std::io::Error::other("disk"));
        assert!(io.is_retryable());
        assert_eq!(io.user_message(), "Local data could not be saved.");

        let json = StoreError::from(serde_json::from_str::<u8>("x").unwrap_err());
        assert!(!json.is_retryable());
        assert_eq!(json.user_message(), "An unexpected error occurred.");
    }
}
