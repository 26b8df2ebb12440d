use thiserror::Error;

/// Errors raised by the host controller.
#[derive(Debug, Error)]
pub enum Error {
    /// Document or patch error.
    #[error("document error: {0}")]
    Document(#[from] docsync_core::Error),

    /// JSON parsing error.
    #[error("json parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The runtime has not sent its render payload yet.
    #[error("view not rendered yet")]
    NotRendered,
}

/// Result type for docsync-host operations.
pub type Result<T> = std::result::Result<T, Error>;
