use std::time::Duration;

/// Errors from remote store operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote path does not exist.
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// The remote could not be reached or failed at the transport level.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote was reached but refused the operation.
    #[error("remote rejected operation on {path}: {reason}")]
    Rejected { path: String, reason: String },

    /// The operation did not finish before its deadline.
    #[error("remote {op} timed out after {after:?}")]
    Timeout { op: String, after: Duration },

    /// Local I/O error while moving bytes to or from the remote.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Check if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_) | RemoteError::Timeout { .. })
    }

    /// Returns `true` for [`RemoteError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Result alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
