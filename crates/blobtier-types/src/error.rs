use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid byte range {0:?}")]
    InvalidRange(String),

    #[error("byte range {start}-{end} out of bounds for object of {size} bytes")]
    RangeOutOfBounds { start: u64, end: u64, size: u64 },
}
