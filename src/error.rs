//! Error handling for hostprep.
//!
//! Centralized error types using thiserror. Step failures and user
//! cancellations are deliberately NOT represented here: they are ordinary
//! `StepOutcome` values returned by the orchestrator, because neither one
//! is allowed to escalate into process-level termination.

use thiserror::Error;

/// Main error type for hostprep.
#[derive(Error, Debug)]
pub enum HostPrepError {
    /// IO errors (file operations, command spawning, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Durable store read/write errors. Fatal for the current operation;
    /// prior on-disk state is guaranteed untouched.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (missing keys, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A step ID that is not in the registry
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for hostprep operations
pub type Result<T> = std::result::Result<T, HostPrepError>;

impl HostPrepError {
    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }
}
