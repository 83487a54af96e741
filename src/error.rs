//! Error handling module for roodmus-bridge
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Library code returns these; the binary wraps them in `anyhow` for reporting.

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::StageTransitionError;

/// Main error type for roodmus-bridge
#[derive(Error, Debug)]
pub enum RoodmusError {
    /// IO errors (file operations, spawning processes, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameter file errors (loading, parsing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parameter validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// External program exited with a non-zero status or was killed by a signal
    #[error("{program} failed (exit code {code}): {stderr}")]
    Program {
        program: String,
        code: i32,
        stderr: String,
    },

    /// A micrograph sidecar could not be read or parsed
    #[error("Failed to parse sidecar {}: {source}", path.display())]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Output collections violate their invariants or cannot be assembled
    #[error("Output error: {0}")]
    Output(String),

    /// Invalid protocol stage transition
    #[error("Stage transition error: {0}")]
    Transition(#[from] StageTransitionError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for roodmus-bridge operations
pub type Result<T> = std::result::Result<T, RoodmusError>;

impl RoodmusError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an output error
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }
}
