//! Error types for the DDNS system
//!
//! Every failure that can leave an update cycle is one of these variants.
//! [`Error::kind`] folds them into the five classes the scheduler's
//! propagation policy cares about.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (unreadable file, bad JSON, bad interval, unknown router type)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Address discovery failed
    #[error("Address provider error: {0}")]
    Provider(String),

    /// One backend's remote update failed
    #[error("Backend error ({service}): {message}")]
    Backend {
        /// Service type of the failing backend
        service: String,
        /// Error message
        message: String,
    },

    /// Writing the configuration file failed
    #[error("Persist error: {0}")]
    Persist(String),

    /// A notifier failed to deliver its notice
    #[error("Notification error: {0}")]
    Notify(String),

    /// A collaborator call exceeded its time bound
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was being waited on
        operation: String,
        /// The bound that was exceeded
        after: Duration,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from plug-in crates)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by the scheduler's error policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Provider,
    Backend,
    Persist,
    Notify,
    Other,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an address provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a backend error
    pub fn backend(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a persist error
    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Classify this error for propagation decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Provider(_) => ErrorKind::Provider,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::Persist(_) => ErrorKind::Persist,
            Error::Notify(_) => ErrorKind::Notify,
            Error::Timeout { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether this error must stop the process
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Config
    }
}
