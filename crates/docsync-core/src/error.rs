use thiserror::Error;

/// Errors that can occur when working with documents and patches.
#[derive(Debug, Error)]
pub enum Error {
    /// A patch or mutation referenced a model that does not exist.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A model with the same id is already part of the document.
    #[error("duplicate model: {0}")]
    DuplicateModel(String),

    /// A binary change referenced a buffer the patch does not carry.
    #[error("patch references missing buffer {0}")]
    MissingBuffer(usize),

    /// The location state is read-only from this side.
    #[error("location is read-only: {0}")]
    ReadOnly(String),

    /// Bound callbacks kept producing mutations.
    #[error("binding cascade exceeded {0} rounds")]
    CascadeLimit(usize),

    /// A render payload did not contain the referenced document.
    #[error("invalid render payload: {0}")]
    InvalidRender(String),

    /// Base64 decoding error.
    #[error("base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// JSON parsing error.
    #[error("json parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for docsync-core operations.
pub type Result<T> = std::result::Result<T, Error>;
