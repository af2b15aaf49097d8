//! Error types for the visualizer bridge
//!
//! Normalization itself never fails; these errors come from the readiness
//! wait, the HTTP client and process initialization.

use std::time::Duration;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The visualization server did not report running in time
    #[error("Server didn't start within {} seconds", .max_wait.as_secs_f64())]
    Timeout { max_wait: Duration },

    /// Transport-level or server-side HTTP failure
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The server refused the request (4xx)
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value could not be shaped into a field record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Process-wide settings were installed twice
    #[error("Visualizer settings are already initialized")]
    AlreadyInitialized,
}

impl BridgeError {
    /// Create a timeout error for the given wait budget
    pub fn timeout(max_wait: Duration) -> Self {
        BridgeError::Timeout { max_wait }
    }

    /// Whether retrying the same request cannot succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BridgeError::Rejected { .. }
                | BridgeError::Serialization(_)
                | BridgeError::InvalidRecord(_)
                | BridgeError::Config(_)
                | BridgeError::AlreadyInitialized
        )
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Http(err.to_string())
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
