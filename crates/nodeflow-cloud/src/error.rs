//! Cloud backend error types

use thiserror::Error;

/// Cloud backend errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// The backend throttled the request; expected to clear on its own.
    #[error("Rate limit reached: {0}")]
    RateLimited(String),

    /// The backend does not offer an optional capability.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("'{operation}' still failing after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<CloudError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether the error belongs to the transient class that the retry
    /// wrapper is allowed to swallow.
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::RateLimited(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, CloudError::Unsupported(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_transient() {
        assert!(CloudError::RateLimited("429".into()).is_transient());
        assert!(!CloudError::ApiError("500".into()).is_transient());
        assert!(!CloudError::Unsupported("networks".into()).is_transient());
    }

    #[test]
    fn test_exhausted_message_names_operation() {
        let err = CloudError::RetriesExhausted {
            operation: "list_sizes".into(),
            attempts: 24,
            source: Box::new(CloudError::RateLimited("slow down".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("list_sizes"));
        assert!(msg.contains("24"));
    }
}
