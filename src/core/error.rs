//! Error types and handling for the Signal Hub relay
//!
//! This module defines all error types used throughout the system. Failures
//! inside the relay core are absorbed as silent no-ops per the delivery
//! contract; these types cover the surfaces where an error is reportable
//! (configuration, HTTP requests, process startup).

use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Signal Hub relay
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network communication errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Network communication errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed or lost
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Timeout occurred
    #[error("Operation timed out")]
    Timeout,

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::NotFound(_) | Error::Serialization(_)
        )
    }

    /// Check if this is a server error (5xx equivalent)
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::Internal(_) | Error::Network(_) | Error::Io(_) | Error::Metrics(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_server_split() {
        assert!(Error::invalid_input("missing field: to").is_client_error());
        assert!(!Error::invalid_input("missing field: to").is_server_error());
        assert!(Error::internal("boom").is_server_error());
        assert!(Error::Network(NetworkError::Timeout).is_server_error());
    }
}
