use std::time::Duration;

use blobtier_remote::RemoteError;
use blobtier_types::{ObjectPath, TypeError};

/// Errors surfaced by the tiered driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The object is absent from every tier that was consulted.
    #[error("not found: {path}: {reason}")]
    NotFound { path: String, reason: String },

    /// Local disk failure in the staging area.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote could not be reached.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote was reached but refused the operation.
    #[error("remote rejected operation: {0}")]
    RemoteRejected(String),

    /// A remote call exceeded its deadline.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: String, after: Duration },

    /// A path or range could not be parsed.
    #[error(transparent)]
    InvalidPath(#[from] TypeError),

    /// The driver configuration is invalid or unreadable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DriverError {
    pub(crate) fn not_found(path: &ObjectPath, reason: impl Into<String>) -> Self {
        DriverError::NotFound { path: path.to_string(), reason: reason.into() }
    }

    /// Map a remote failure for `path`.
    ///
    /// Missing remote paths become [`DriverError::NotFound`]; transport
    /// failures keep their retryable kind.
    pub(crate) fn from_remote(path: &ObjectPath, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(remote) => {
                Self::not_found(path, format!("remote path {remote} does not exist"))
            }
            RemoteError::Unavailable(msg) => DriverError::RemoteUnavailable(msg),
            RemoteError::Timeout { op, after } => DriverError::Timeout { op, after },
            RemoteError::Rejected { path: remote, reason } => {
                DriverError::RemoteRejected(format!("{remote}: {reason}"))
            }
            RemoteError::Io(e) => DriverError::Io(e),
        }
    }

    /// Map a remote failure that happened while materialising a staged copy.
    ///
    /// Anything that is not a transport failure means the content could not
    /// be produced, which callers see as [`DriverError::NotFound`].
    pub(crate) fn from_materialise(path: &ObjectPath, err: RemoteError) -> Self {
        if err.is_retryable() {
            Self::from_remote(path, err)
        } else {
            Self::not_found(path, err.to_string())
        }
    }

    /// Check if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::RemoteUnavailable(_) | DriverError::Timeout { .. })
    }

    /// Returns `true` for [`DriverError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound { .. })
    }
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
