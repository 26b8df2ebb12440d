use crate::application::ApplicationError;
use thiserror::Error;

/// Errors from the sandboxed application runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document or patch error.
    #[error("Document error: {0}")]
    Document(#[from] docsync_core::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing or validating the worker manifest.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A single dependency could not be installed.
    #[error("Install error for {dependency}: {reason}")]
    Install {
        /// Dependency spec as written in the manifest.
        dependency: String,
        /// What went wrong.
        reason: String,
    },

    /// URL host is not on the installer allowlist.
    #[error("Host not allowed: {0}")]
    HostNotAllowed(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The application definition failed to execute.
    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),

    /// The bootstrap pipeline already failed.
    #[error("Bootstrap failed earlier")]
    BootFailed,

    /// The session was requested before the bootstrap finished.
    #[error("Session not ready")]
    NotReady,
}

impl Error {
    /// Build an install error.
    pub fn install(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Install {
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for docsync-runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
