//! OpenStack driver error types

use nodeflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("openstack CLI not found. Please install: pip install python-openstackclient")]
    CliNotFound,

    /// HTTP 429 or an explicit rate limit message from the API
    #[error("Rate limit reached: {0}")]
    RateLimited(String),

    /// The deployment lacks the service behind a command (e.g. no Neutron)
    #[error("Not supported by this cloud: {0}")]
    Unsupported(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("openstack command failed: {0}")]
    CommandFailed(String),

    #[error("Server {id} entered status {status}")]
    ServerFailed { id: String, status: String },

    #[error("Volume {id} entered status {status}")]
    VolumeFailed { id: String, status: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Unexpected CLI output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpenStackError>;

impl From<OpenStackError> for CloudError {
    fn from(e: OpenStackError) -> Self {
        match e {
            OpenStackError::RateLimited(msg) => CloudError::RateLimited(msg),
            OpenStackError::Unsupported(msg) => CloudError::Unsupported(msg),
            OpenStackError::NotFound(msg) => CloudError::ResourceNotFound(msg),
            OpenStackError::Timeout(msg) => CloudError::Timeout(msg),
            OpenStackError::JsonError(e) => CloudError::Json(e),
            OpenStackError::IoError(e) => CloudError::Io(e),
            OpenStackError::CliNotFound | OpenStackError::CommandFailed(_) => {
                CloudError::CommandFailed(e.to_string())
            }
            other => CloudError::ApiError(other.to_string()),
        }
    }
}
