use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{RemoteError, RemoteResult};
use crate::traits::{normalize_remote, remote_parent, RemoteEntry, RemoteStore};

/// Snapshot of how many times each remote operation was invoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub mkdir: usize,
    pub du: usize,
    pub rm: usize,
    pub upload: usize,
    pub download: usize,
    pub list: usize,
    pub exists: usize,
}

impl CallCounts {
    /// Sum over all operations.
    pub fn total(&self) -> usize {
        self.mkdir + self.du + self.rm + self.upload + self.download + self.list + self.exists
    }
}

#[derive(Default)]
struct Counters {
    mkdir: AtomicUsize,
    du: AtomicUsize,
    rm: AtomicUsize,
    upload: AtomicUsize,
    download: AtomicUsize,
    list: AtomicUsize,
    exists: AtomicUsize,
}

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }

    /// Every file or directory strictly beneath `dir`.
    fn descendants<'a>(&'a self, dir: &str) -> impl Iterator<Item = &'a String> + 'a {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{dir}/") };
        let files = self.files.keys().filter({
            let prefix = prefix.clone();
            move |k| k.starts_with(&prefix)
        });
        let dirs = self.dirs.iter().filter(move |k| k.starts_with(&prefix));
        files.chain(dirs)
    }
}

/// In-memory remote filesystem.
///
/// Intended for tests and embedding. The tree lives behind a `RwLock` and
/// mirrors HDFS shell semantics closely enough to exercise the driver's
/// failure handling: uploads need an existing parent, removals of missing
/// paths fail, and the whole remote can be switched offline.
pub struct InMemoryRemote {
    tree: RwLock<Tree>,
    online: AtomicBool,
    counters: Counters,
}

impl InMemoryRemote {
    /// Create an empty remote containing only `/`.
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::default()),
            online: AtomicBool::new(true),
            counters: Counters::default(),
        }
    }

    /// Simulate losing (or regaining) connectivity. While offline every
    /// call fails with [`RemoteError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Store a file directly, creating its ancestors. Bypasses counters.
    pub fn seed(&self, path: &str, data: &[u8]) {
        let path = normalize_remote(path);
        let mut tree = self.tree.write().expect("lock poisoned");
        let mut parent = remote_parent(&path).to_string();
        while parent != "/" {
            let next = remote_parent(&parent).to_string();
            tree.dirs.insert(parent);
            parent = next;
        }
        tree.files.insert(path, data.to_vec());
    }

    /// Read a file directly. Bypasses counters and the offline switch.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let tree = self.tree.read().expect("lock poisoned");
        tree.files.get(&normalize_remote(path)).cloned()
    }

    /// Number of files stored.
    pub fn file_count(&self) -> usize {
        self.tree.read().expect("lock poisoned").files.len()
    }

    /// Per-operation call counts since construction.
    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            mkdir: c.mkdir.load(Ordering::SeqCst),
            du: c.du.load(Ordering::SeqCst),
            rm: c.rm.load(Ordering::SeqCst),
            upload: c.upload.load(Ordering::SeqCst),
            download: c.download.load(Ordering::SeqCst),
            list: c.list.load(Ordering::SeqCst),
            exists: c.exists.load(Ordering::SeqCst),
        }
    }

    fn enter(&self, counter: &AtomicUsize) -> RemoteResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("remote is offline".into()))
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for InMemoryRemote {
    fn mkdir_parents(&self, path: &str) -> RemoteResult<()> {
        self.enter(&self.counters.mkdir)?;
        let path = normalize_remote(path);
        let mut tree = self.tree.write().expect("lock poisoned");

        let mut chain = Vec::new();
        let mut current = path.clone();
        while current != "/" {
            if tree.files.contains_key(&current) {
                return Err(RemoteError::Rejected {
                    path: current,
                    reason: "exists as a file".into(),
                });
            }
            let next = remote_parent(&current).to_string();
            chain.push(current);
            current = next;
        }
        tree.dirs.extend(chain);
        Ok(())
    }

    fn disk_usage(&self, path: &str) -> RemoteResult<u64> {
        self.enter(&self.counters.du)?;
        let path = normalize_remote(path);
        let tree = self.tree.read().expect("lock poisoned");

        if let Some(data) = tree.files.get(&path) {
            return Ok(data.len() as u64);
        }
        if !tree.is_dir(&path) {
            return Err(RemoteError::NotFound(path));
        }
        let prefix = if path == "/" { "/".to_string() } else { format!("{path}/") };
        Ok(tree
            .files
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| v.len() as u64)
            .sum())
    }

    fn remove_recursive(&self, path: &str) -> RemoteResult<()> {
        self.enter(&self.counters.rm)?;
        let path = normalize_remote(path);
        let mut tree = self.tree.write().expect("lock poisoned");

        if tree.files.remove(&path).is_some() {
            return Ok(());
        }
        if path == "/" || !tree.dirs.contains(&path) {
            return Err(RemoteError::NotFound(path));
        }
        let doomed: Vec<String> = tree.descendants(&path).cloned().collect();
        for key in doomed {
            tree.files.remove(&key);
            tree.dirs.remove(&key);
        }
        tree.dirs.remove(&path);
        Ok(())
    }

    fn upload_force(&self, local_path: &Path, remote_path: &str) -> RemoteResult<()> {
        self.enter(&self.counters.upload)?;
        let data = fs::read(local_path)?;
        let path = normalize_remote(remote_path);
        let mut tree = self.tree.write().expect("lock poisoned");

        let parent = remote_parent(&path);
        if !tree.is_dir(parent) {
            return Err(RemoteError::NotFound(parent.to_string()));
        }
        if tree.dirs.contains(&path) {
            return Err(RemoteError::Rejected { path, reason: "is a directory".into() });
        }
        tree.files.insert(path, data);
        Ok(())
    }

    fn download(&self, remote_path: &str, local_path: &Path) -> RemoteResult<()> {
        self.enter(&self.counters.download)?;
        let path = normalize_remote(remote_path);
        let data = {
            let tree = self.tree.read().expect("lock poisoned");
            match tree.files.get(&path) {
                Some(data) => data.clone(),
                None if tree.is_dir(&path) => {
                    return Err(RemoteError::Rejected { path, reason: "is a directory".into() })
                }
                None => return Err(RemoteError::NotFound(path)),
            }
        };
        fs::write(local_path, data)?;
        Ok(())
    }

    fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        self.enter(&self.counters.list)?;
        let path = normalize_remote(path);
        let tree = self.tree.read().expect("lock poisoned");

        if let Some(data) = tree.files.get(&path) {
            return Ok(vec![RemoteEntry::file(path.clone(), data.len() as u64)]);
        }
        if !tree.is_dir(&path) {
            return Err(RemoteError::NotFound(path));
        }

        let mut entries: Vec<RemoteEntry> = tree
            .files
            .iter()
            .filter(|(k, _)| remote_parent(k) == path)
            .map(|(k, v)| RemoteEntry::file(k.clone(), v.len() as u64))
            .chain(
                tree.dirs
                    .iter()
                    .filter(|k| remote_parent(k) == path)
                    .map(|k| RemoteEntry::dir(k.clone())),
            )
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn exists(&self, path: &str) -> RemoteResult<bool> {
        self.enter(&self.counters.exists)?;
        let path = normalize_remote(path);
        let tree = self.tree.read().expect("lock poisoned");
        Ok(tree.files.contains_key(&path) || tree.is_dir(&path))
    }
}

impl std::fmt::Debug for InMemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRemote")
            .field("file_count", &self.file_count())
            .field("online", &self.online.load(Ordering::SeqCst))
            .finish()
    }
}
