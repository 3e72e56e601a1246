//! Error types for the LINE relay Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or serving the relay.
#[derive(Error, Debug)]
pub enum Error {
    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service-account credentials could not be loaded or used
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Webhook signature missing or invalid
    #[error("Signature error: {0}")]
    Signature(String),

    /// Malformed webhook payload
    #[error("Invalid payload: {0}")]
    Payload(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Signature(_) => 401,
            _ => 500,
        }
    }
}
