use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;

/// One row of a remote directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Full remote path. Backends backed by a real cluster may return a
    /// scheme-qualified URI (`hdfs://namenode:8020/registry/a`).
    pub path: String,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Last modification time as reported by the remote, if any.
    pub modified: Option<NaiveDateTime>,
}

impl RemoteEntry {
    /// A file entry without a modification time.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self { path: path.into(), size, is_dir: false, modified: None }
    }

    /// A directory entry without a modification time.
    pub fn dir(path: impl Into<String>) -> Self {
        Self { path: path.into(), size: 0, is_dir: true, modified: None }
    }
}

/// The authoritative remote filesystem.
///
/// All implementations must satisfy these invariants:
/// - Every call is blocking and synchronous relative to its caller.
/// - A path that does not exist yields [`RemoteError::NotFound`](crate::RemoteError::NotFound);
///   transport failures yield `Unavailable` or `Timeout`.
/// - `upload_force` overwrites an existing object but does not create
///   missing parent directories.
/// - `list` on a file returns that file's own entry; on a directory it
///   returns the direct children.
pub trait RemoteStore: Send + Sync {
    /// Create `path` and every missing ancestor. Idempotent.
    fn mkdir_parents(&self, path: &str) -> RemoteResult<()>;

    /// Total bytes stored at or beneath `path`.
    fn disk_usage(&self, path: &str) -> RemoteResult<u64>;

    /// Remove a file, or a directory and everything beneath it.
    fn remove_recursive(&self, path: &str) -> RemoteResult<()>;

    /// Copy a local file to `remote_path`, replacing any existing object.
    fn upload_force(&self, local_path: &Path, remote_path: &str) -> RemoteResult<()>;

    /// Copy `remote_path` into a new local file at `local_path`.
    fn download(&self, remote_path: &str, local_path: &Path) -> RemoteResult<()>;

    /// List the entries at `path`.
    fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>>;

    /// Check whether `path` exists as a file or directory.
    fn exists(&self, path: &str) -> RemoteResult<bool>;
}

/// Parent of an absolute remote path (`"/"` for top-level entries).
pub(crate) fn remote_parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Normalise a remote path to a leading slash and no trailing slash.
pub(crate) fn normalize_remote(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
