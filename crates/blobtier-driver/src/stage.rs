//! Local staging tier.
//!
//! Every staged file is a byte-identical mirror of one remote object. Files
//! are never modified in place: new content is written to a temporary file
//! in the same directory and renamed over the target, so a reader holding an
//! open handle keeps seeing the content it opened.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

/// Filesystem operations on staged copies.
#[derive(Clone, Debug)]
pub struct LocalStage {
    root: PathBuf,
}

impl LocalStage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every missing ancestor of `path`.
    pub fn ensure_parent_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(parent_of(path)?)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    pub fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    pub fn size(&self, path: &Path) -> io::Result<u64> {
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            return Err(io::Error::new(io::ErrorKind::Other, "staged path is a directory"));
        }
        Ok(meta.len())
    }

    /// Replace the content at `path`, creating parents first.
    pub fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let mut spool = self.spool(path)?;
        spool.write_chunk(content)?;
        spool.commit()?;
        Ok(())
    }

    /// Start an incremental write that replaces `path` on commit.
    pub fn spool(&self, path: &Path) -> io::Result<SpoolFile> {
        let parent = parent_of(path)?;
        fs::create_dir_all(parent)?;
        let tmp = tempfile::Builder::new().prefix(".spool-").tempfile_in(parent)?;
        Ok(SpoolFile { tmp, target: path.to_path_buf(), written: 0 })
    }

    /// Produce `path` by letting `fetch` write a file at a scratch location,
    /// then moving it into place. On failure nothing is left at `path`.
    pub fn fill_with<E>(
        &self,
        path: &Path,
        fetch: impl FnOnce(&Path) -> Result<(), E>,
    ) -> Result<(), E>
    where
        E: From<io::Error>,
    {
        let parent = parent_of(path)?;
        fs::create_dir_all(parent)?;
        let scratch = tempfile::Builder::new().prefix(".fill-").tempdir_in(parent)?;
        let landing = scratch.path().join("content");
        fetch(&landing)?;
        fs::rename(&landing, path)?;
        Ok(())
    }

    /// Remove a file, or a directory and its contents. Missing paths are fine.
    pub fn delete(&self, path: &Path) -> io::Result<()> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn parent_of(path: &Path) -> io::Result<&Path> {
    path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{} has no parent", path.display()))
    })
}

/// A temporary file beside a staged path, renamed over it on commit.
///
/// Dropping an uncommitted spool deletes the temporary file.
#[derive(Debug)]
pub struct SpoolFile {
    tmp: NamedTempFile,
    target: PathBuf,
    written: u64,
}

impl SpoolFile {
    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.tmp.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the spooled content.
    pub fn commit(mut self) -> io::Result<u64> {
        self.tmp.flush()?;
        let written = self.written;
        let target = self.target;
        self.tmp.persist(&target).map_err(|e| e.error)?;
        debug!(path = %target.display(), bytes = written, "staged file committed");
        Ok(written)
    }
}
