//! Error types for the content store and its backends

use std::process::ExitStatus;
use thiserror::Error;

/// Errors returned by [`ContentStore`](crate::store::ContentStore) operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required property is missing or a directive is malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// The identifier does not name an existing post
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Stored text is not a valid frontmatter document
    #[error("Format error: {0}")]
    Format(String),

    /// The derived identifier is already taken and the collision policy rejects it
    #[error("Post already exists: {0}")]
    Conflict(String),

    /// A stage, commit, publish or entry I/O step failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Errors raised by a [`VersionedBackend`](crate::store::VersionedBackend)
#[derive(Error, Debug)]
pub enum BackendError {
    /// An external command exited unsuccessfully
    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure forced through `MemoryBackend::fail_on`
    #[error("injected {operation} failure")]
    Injected { operation: &'static str },
}

impl StoreError {
    /// Build a format error from anything displayable
    pub(crate) fn format(err: impl std::fmt::Display) -> Self {
        StoreError::Format(err.to_string())
    }
}
