use std::path::{Path, PathBuf};

use blobtier_types::ObjectPath;

/// Where one object lives in the local and remote tiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    pub local: PathBuf,
    pub remote: String,
}

/// Maps object paths onto the staging directory and the remote root.
#[derive(Clone, Debug)]
pub struct PathResolver {
    remote_root: String,
    staging_root: PathBuf,
}

impl PathResolver {
    pub fn new(remote_root: impl Into<String>, staging_root: impl Into<PathBuf>) -> Self {
        let mut remote_root = remote_root.into();
        while remote_root.len() > 1 && remote_root.ends_with('/') {
            remote_root.pop();
        }
        Self { remote_root, staging_root: staging_root.into() }
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Resolve `path`. The root path maps to the two roots themselves.
    pub fn resolve(&self, path: &ObjectPath) -> ResolvedPath {
        if path.is_root() {
            return ResolvedPath {
                local: self.staging_root.clone(),
                remote: self.remote_root.clone(),
            };
        }

        let mut local = self.staging_root.clone();
        local.extend(path.segments());

        let remote = if self.remote_root.ends_with('/') {
            format!("{}{}", self.remote_root, path.as_str())
        } else {
            format!("{}/{}", self.remote_root, path.as_str())
        };
        ResolvedPath { local, remote }
    }

    /// Map a remote listing entry back to its object path.
    ///
    /// Any `scheme://authority` prefix is ignored on both sides, so
    /// `hdfs://nn:8020/registry/a/b` relativises against `/registry` to
    /// `a/b`. Entries outside the root yield `None`.
    pub fn relativize(&self, remote_entry: &str) -> Option<ObjectPath> {
        let root = strip_authority(&self.remote_root).trim_end_matches('/');
        let entry = strip_authority(remote_entry).trim_end_matches('/');

        let rest = if root.is_empty() {
            entry
        } else if entry == root {
            ""
        } else {
            entry.strip_prefix(root)?.strip_prefix('/')?
        };
        ObjectPath::parse(rest).ok()
    }
}

fn strip_authority(uri: &str) -> &str {
    match uri.find("://") {
        Some(idx) => {
            let after = &uri[idx + 3..];
            after.find('/').map_or("/", |slash| &after[slash..])
        }
        None => uri,
    }
}
