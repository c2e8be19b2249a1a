//! Error types and result aliases for the tracelink library.
//!
//! This module defines the core error type [`TracelinkError`] and the [`Result`] type alias
//! used throughout the library. All public APIs that can fail return `Result<T>` for
//! consistent error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracelinkError {
    #[error("Capture backend error: {0}")]
    CaptureError(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cannot register agent {0} while tracing is active")]
    AgentRegistrationWhileTracing(String),
}

pub type Result<T> = std::result::Result<T, TracelinkError>;
