//! Error types for the op-runtime core

use thiserror::Error;

use crate::types::{ErrorKind, JobStatus};

/// Main error type for runtime operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Output validation error: {0}")]
    OutputValidation(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin unavailable: {0}")]
    PluginUnavailable(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timeout: plugin '{plugin}' exceeded {timeout_ms}ms")]
    Timeout { plugin: String, timeout_ms: u64 },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {id} is already {status}")]
    JobConflict { id: String, status: JobStatus },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an output validation error
    pub fn output_validation(msg: impl Into<String>) -> Self {
        Error::OutputValidation(msg.into())
    }

    /// Create a plugin error
    pub fn plugin(msg: impl Into<String>) -> Self {
        Error::Plugin(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Classification into the closed error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::OutputValidation(_) => ErrorKind::ValidationError,
            Error::Plugin(_) | Error::PluginNotFound(_) | Error::PluginUnavailable(_) => {
                ErrorKind::PluginError
            }
            _ => ErrorKind::ExecutionError,
        }
    }

    /// Message without the variant prefix, as shown to callers
    pub fn message(&self) -> String {
        match self {
            Error::Validation(msg)
            | Error::OutputValidation(msg)
            | Error::Plugin(msg)
            | Error::Execution(msg)
            | Error::Config(msg)
            | Error::Internal(msg) => msg.clone(),
            Error::PluginNotFound(name) => format!("Plugin '{}' is not registered", name),
            Error::PluginUnavailable(name) => format!("Plugin '{}' is not available", name),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(other) => Error::Internal(other.to_string()),
        }
    }
}
