use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RemoteError, RemoteResult};
use crate::traits::{normalize_remote, remote_parent, RemoteEntry, RemoteStore};

/// A local directory tree standing in for the remote filesystem.
///
/// Useful with a mounted network share, or to run the driver end to end
/// without a cluster. Remote path `/registry/a` maps to `<base>/registry/a`.
#[derive(Debug, Clone)]
pub struct FsRemote {
    base: PathBuf,
}

impl FsRemote {
    /// Serve the remote namespace from `base`, creating it if needed.
    pub fn open(base: impl Into<PathBuf>) -> RemoteResult<Self> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// The directory backing `/`.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn map(&self, remote_path: &str) -> PathBuf {
        let normalized = normalize_remote(remote_path);
        let mut out = self.base.clone();
        out.extend(normalized.split('/').filter(|s| !s.is_empty()));
        out
    }

    fn entry(&self, remote_path: String, local: &Path) -> RemoteResult<RemoteEntry> {
        let meta = fs::metadata(local).map_err(|e| not_found_or(e, &remote_path))?;
        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).naive_utc());
        Ok(RemoteEntry {
            path: remote_path,
            size: if meta.is_dir() { 0 } else { meta.len() },
            is_dir: meta.is_dir(),
            modified,
        })
    }
}

fn not_found_or(err: io::Error, remote_path: &str) -> RemoteError {
    if err.kind() == io::ErrorKind::NotFound {
        RemoteError::NotFound(remote_path.to_string())
    } else {
        RemoteError::Io(err)
    }
}

impl RemoteStore for FsRemote {
    fn mkdir_parents(&self, path: &str) -> RemoteResult<()> {
        let normalized = normalize_remote(path);
        let mut current = normalized.as_str();
        while current != "/" {
            if self.map(current).is_file() {
                return Err(RemoteError::Rejected {
                    path: current.to_string(),
                    reason: "exists as a file".into(),
                });
            }
            current = remote_parent(current);
        }
        fs::create_dir_all(self.map(&normalized))?;
        Ok(())
    }

    fn disk_usage(&self, path: &str) -> RemoteResult<u64> {
        let local = self.map(path);
        if !local.exists() {
            return Err(RemoteError::NotFound(normalize_remote(path)));
        }
        let mut total = 0;
        for entry in WalkDir::new(&local) {
            let entry = entry.map_err(|e| RemoteError::Io(e.into()))?;
            if entry.file_type().is_file() {
                total += entry.metadata().map_err(|e| RemoteError::Io(e.into()))?.len();
            }
        }
        Ok(total)
    }

    fn remove_recursive(&self, path: &str) -> RemoteResult<()> {
        let normalized = normalize_remote(path);
        if normalized == "/" {
            return Err(RemoteError::Rejected {
                path: normalized,
                reason: "refusing to remove the remote root".into(),
            });
        }
        let local = self.map(&normalized);
        let meta = fs::symlink_metadata(&local).map_err(|e| not_found_or(e, &normalized))?;
        if meta.is_dir() {
            fs::remove_dir_all(&local)?;
        } else {
            fs::remove_file(&local)?;
        }
        debug!(path = %normalized, "removed remote path");
        Ok(())
    }

    fn upload_force(&self, local_path: &Path, remote_path: &str) -> RemoteResult<()> {
        let normalized = normalize_remote(remote_path);
        let parent = remote_parent(&normalized);
        if !self.map(parent).is_dir() {
            return Err(RemoteError::NotFound(parent.to_string()));
        }
        let target = self.map(&normalized);
        if target.is_dir() {
            return Err(RemoteError::Rejected { path: normalized, reason: "is a directory".into() });
        }
        let copied = fs::copy(local_path, &target)?;
        debug!(path = %normalized, bytes = copied, "uploaded");
        Ok(())
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> RemoteResult<()> {
        let normalized = normalize_remote(remote_path);
        let source = self.map(&normalized);
        if source.is_dir() {
            return Err(RemoteError::Rejected { path: normalized, reason: "is a directory".into() });
        }
        if !source.exists() {
            return Err(RemoteError::NotFound(normalized));
        }
        fs::copy(&source, local_path)?;
        Ok(())
    }

    fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let normalized = normalize_remote(path);
        let local = self.map(&normalized);
        let meta = fs::metadata(&local).map_err(|e| not_found_or(e, &normalized))?;
        if !meta.is_dir() {
            return Ok(vec![self.entry(normalized, &local)?]);
        }

        let mut entries = Vec::new();
        for child in fs::read_dir(&local)? {
            let child = child?;
            let name = child.file_name().to_string_lossy().into_owned();
            let remote = if normalized == "/" {
                format!("/{name}")
            } else {
                format!("{normalized}/{name}")
            };
            entries.push(self.entry(remote, &child.path())?);
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn exists(&self, path: &str) -> RemoteResult<bool> {
        Ok(self.map(path).exists())
    }
}
