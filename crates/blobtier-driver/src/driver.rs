use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use blobtier_cache::MemoryCache;
use blobtier_remote::RemoteStore;
use blobtier_types::{ByteRange, ObjectPath, TypeError};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use crate::locks::PathLocks;
use crate::resolver::{PathResolver, ResolvedPath};
use crate::stage::LocalStage;
use crate::stream::ChunkStream;
use crate::traits::{BlobStore, ListEntry, WriteReceipt};

/// Three-tier blob driver: memory cache, local staging, remote filesystem.
///
/// Reads fall through the tiers and fill the faster ones on the way back.
/// Writes land on local disk first, are uploaded, and only then reach the
/// memory tier. Each path is guarded by a striped lock held across the
/// local and remote steps, so operations on one path are serialised while
/// unrelated paths proceed in parallel.
pub struct TieredBlobDriver {
    config: DriverConfig,
    resolver: PathResolver,
    stage: LocalStage,
    cache: Arc<MemoryCache>,
    remote: Arc<dyn RemoteStore>,
    locks: PathLocks,
}

impl TieredBlobDriver {
    /// Build a driver with its own memory tier sized from `config.cache`.
    pub fn new(config: DriverConfig, remote: Arc<dyn RemoteStore>) -> DriverResult<Self> {
        let cache = Arc::new(MemoryCache::new(config.cache.clone()));
        Self::with_cache(config, remote, cache)
    }

    /// Build a driver around an existing memory tier.
    pub fn with_cache(
        config: DriverConfig,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<MemoryCache>,
    ) -> DriverResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.local_staging_root)?;
        debug!(
            root = %config.root_path,
            staging = %config.local_staging_root.display(),
            "driver ready"
        );
        Ok(Self {
            resolver: PathResolver::new(config.root_path.clone(), config.local_staging_root.clone()),
            stage: LocalStage::new(config.local_staging_root.clone()),
            locks: PathLocks::new(config.lock_stripes),
            config,
            cache,
            remote,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Make sure a staged copy of `path` exists, downloading it if needed.
    /// Callers hold the path's lock.
    fn materialise(&self, path: &ObjectPath, resolved: &ResolvedPath) -> DriverResult<()> {
        if self.stage.exists(&resolved.local) {
            debug!(path = %path, "staged copy present");
            return Ok(());
        }
        debug!(path = %path, remote = %resolved.remote, "downloading into staging");
        self.stage
            .fill_with(&resolved.local, |landing| self.remote.download(&resolved.remote, landing))
            .map_err(|e| DriverError::from_materialise(path, e))
    }

    /// Upload the staged copy of `path`, creating the remote parent first.
    /// Callers hold the path's lock.
    fn sync_remote(&self, path: &ObjectPath, resolved: &ResolvedPath) -> DriverResult<()> {
        let parent = path.parent().unwrap_or_else(ObjectPath::root);
        let remote_parent = self.resolver.resolve(&parent).remote;

        let parent_exists =
            self.remote.exists(&remote_parent).map_err(|e| DriverError::from_remote(path, e))?;
        if !parent_exists {
            self.remote
                .mkdir_parents(&remote_parent)
                .map_err(|e| DriverError::from_remote(path, e))?;
        }
        self.remote
            .upload_force(&resolved.local, &resolved.remote)
            .map_err(|e| DriverError::from_remote(path, e))?;
        debug!(path = %path, remote = %resolved.remote, "uploaded");
        Ok(())
    }

    fn reject_root(path: &ObjectPath) -> DriverResult<()> {
        if path.is_root() {
            return Err(TypeError::InvalidPath {
                path: String::new(),
                reason: "the store root cannot hold content".into(),
            }
            .into());
        }
        Ok(())
    }
}

impl BlobStore for TieredBlobDriver {
    fn get_content(&self, path: &ObjectPath) -> DriverResult<Bytes> {
        if let Some(hit) = self.cache.lookup(path) {
            debug!(path = %path, "memory hit");
            return Ok(hit);
        }

        let resolved = self.resolver.resolve(path);
        let _guard = self.locks.lock(path);
        self.materialise(path, &resolved)?;
        let content = self.stage.read(&resolved.local).map_err(|e| {
            DriverError::not_found(path, format!("cannot read staged copy: {e}"))
        })?;

        let content = Bytes::from(content);
        self.cache.insert(path.clone(), content.clone());
        Ok(content)
    }

    fn put_content(&self, path: &ObjectPath, content: Bytes) -> DriverResult<String> {
        Self::reject_root(path)?;
        let resolved = self.resolver.resolve(path);
        let _guard = self.locks.lock(path);

        let synced = self
            .stage
            .write(&resolved.local, &content)
            .map_err(DriverError::from)
            .and_then(|()| self.sync_remote(path, &resolved));
        if let Err(e) = synced {
            // The staged copy may now be ahead of the remote; never serve
            // either from memory until a write succeeds.
            self.cache.invalidate(path);
            return Err(e);
        }

        self.cache.insert(path.clone(), content);
        Ok(resolved.remote)
    }

    fn stream_read(&self, path: &ObjectPath, range: Option<ByteRange>) -> DriverResult<ChunkStream> {
        let resolved = self.resolver.resolve(path);
        let file = {
            let _guard = self.locks.lock(path);
            self.materialise(path, &resolved)?;
            if self.stage.is_dir(&resolved.local) {
                return Err(DriverError::not_found(path, "staged path is a directory"));
            }
            self.stage.open(&resolved.local).map_err(|e| {
                DriverError::not_found(path, format!("cannot open staged copy: {e}"))
            })?
        };
        Ok(ChunkStream::open(file, range, self.config.buffer_size)?)
    }

    fn stream_write(&self, path: &ObjectPath, input: &mut dyn Read) -> DriverResult<WriteReceipt> {
        Self::reject_root(path)?;
        let resolved = self.resolver.resolve(path);

        let mut spool = self.stage.spool(&resolved.local)?;
        let mut buf = vec![0u8; self.config.buffer_size];
        let mut input_truncated = false;
        loop {
            match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => spool.write_chunk(&buf[..n])?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if self.config.strict_stream_input => return Err(e.into()),
                Err(e) => {
                    warn!(
                        path = %path,
                        error = %e,
                        bytes = spool.bytes_written(),
                        "input failed mid-stream; storing what was read"
                    );
                    input_truncated = true;
                    break;
                }
            }
        }

        let _guard = self.locks.lock(path);
        self.cache.invalidate(path);
        let bytes_written = spool.commit()?;
        self.sync_remote(path, &resolved)?;

        Ok(WriteReceipt { remote_path: resolved.remote, bytes_written, input_truncated })
    }

    fn list_directory(&self, path: &ObjectPath) -> DriverResult<Vec<ListEntry>> {
        let resolved = self.resolver.resolve(path);
        let entries = self
            .remote
            .list(&resolved.remote)
            .map_err(|e| DriverError::from_remote(path, e))?;

        let listing: Vec<ListEntry> = entries
            .into_iter()
            .filter_map(|entry| match self.resolver.relativize(&entry.path) {
                Some(relative) => Some(ListEntry {
                    path: relative,
                    is_dir: entry.is_dir,
                    size: entry.size,
                }),
                None => {
                    debug!(entry = %entry.path, "listing entry outside store root");
                    None
                }
            })
            .collect();

        if listing.is_empty() {
            return Err(DriverError::not_found(path, "directory is empty or missing"));
        }
        Ok(listing)
    }

    fn exists(&self, path: &ObjectPath) -> DriverResult<bool> {
        let resolved = self.resolver.resolve(path);
        if self.stage.exists(&resolved.local) {
            return Ok(true);
        }
        self.remote.exists(&resolved.remote).map_err(|e| DriverError::from_remote(path, e))
    }

    fn remove(&self, path: &ObjectPath) -> DriverResult<()> {
        let resolved = self.resolver.resolve(path);

        // Children of a staged directory are guarded by other stripes, so a
        // directory is only deleted with every stripe held.
        let _guard = loop {
            if self.stage.is_dir(&resolved.local) {
                let _all = self.locks.lock_all();
                if self.stage.is_dir(&resolved.local) {
                    self.stage.delete(&resolved.local)?;
                    let dropped = self.cache.invalidate_prefix(path);
                    debug!(path = %path, cached = dropped, "removed staged directory");
                    return Ok(());
                }
            }
            let guard = self.locks.lock(path);
            if !self.stage.is_dir(&resolved.local) {
                break guard;
            }
        };

        if let Err(e) = self.stage.delete(&resolved.local) {
            warn!(path = %path, error = %e, "failed to delete staged copy");
        }
        let removed = self.remote.remove_recursive(&resolved.remote);
        self.cache.invalidate(path);
        removed.map_err(|e| DriverError::from_remote(path, e))?;
        debug!(path = %path, "removed");
        Ok(())
    }

    fn get_size(&self, path: &ObjectPath) -> DriverResult<u64> {
        let resolved = self.resolver.resolve(path);
        match self.stage.size(&resolved.local) {
            Ok(size) => Ok(size),
            Err(_) => self
                .remote
                .disk_usage(&resolved.remote)
                .map_err(|e| DriverError::from_remote(path, e)),
        }
    }
}

impl std::fmt::Debug for TieredBlobDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredBlobDriver")
            .field("root", &self.resolver.remote_root())
            .field("staging", &self.resolver.staging_root())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use blobtier_cache::CacheConfig;
    use blobtier_remote::{InMemoryRemote, RemoteEntry, RemoteError, RemoteResult};
    use proptest::prelude::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        remote: Arc<InMemoryRemote>,
        driver: TieredBlobDriver,
    }

    fn fixture_with(tweak: impl FnOnce(&mut DriverConfig)) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DriverConfig::with_roots("/registry", dir.path().join("staging"));
        config.buffer_size = 4;
        tweak(&mut config);
        let remote = Arc::new(InMemoryRemote::new());
        let driver = TieredBlobDriver::new(config, remote.clone()).unwrap();
        Fixture { _dir: dir, remote, driver }
    }

    fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    fn p(s: &str) -> ObjectPath {
        ObjectPath::parse(s).unwrap()
    }

    fn staged(f: &Fixture, path: &str) -> std::path::PathBuf {
        f.driver.resolver().resolve(&p(path)).local
    }

    /// Remote whose every call fails with a configurable error.
    struct FailingRemote {
        inner: InMemoryRemote,
        failing: AtomicBool,
        error: fn() -> RemoteError,
    }

    impl FailingRemote {
        fn new(error: fn() -> RemoteError) -> Self {
            Self { inner: InMemoryRemote::new(), failing: AtomicBool::new(false), error }
        }

        fn check(&self) -> RemoteResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    impl RemoteStore for FailingRemote {
        fn mkdir_parents(&self, path: &str) -> RemoteResult<()> {
            self.check()?;
            self.inner.mkdir_parents(path)
        }
        fn disk_usage(&self, path: &str) -> RemoteResult<u64> {
            self.check()?;
            self.inner.disk_usage(path)
        }
        fn remove_recursive(&self, path: &str) -> RemoteResult<()> {
            self.check()?;
            self.inner.remove_recursive(path)
        }
        fn upload_force(&self, local: &Path, remote: &str) -> RemoteResult<()> {
            self.check()?;
            self.inner.upload_force(local, remote)
        }
        fn download(&self, remote: &str, local: &Path) -> RemoteResult<()> {
            self.check()?;
            self.inner.download(remote, local)
        }
        fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
            self.check()?;
            self.inner.list(path)
        }
        fn exists(&self, path: &str) -> RemoteResult<bool> {
            self.check()?;
            self.inner.exists(path)
        }
    }

    fn timing_out() -> RemoteError {
        RemoteError::Timeout { op: "get".into(), after: Duration::from_secs(5) }
    }

    /// Reader that yields `data` and then fails.
    struct BrokenReader {
        data: io::Cursor<Vec<u8>>,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
                n => Ok(n),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Round trip and write-through
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_round_trips() {
        let f = fixture();
        let remote_path = f.driver.put_content(&p("/a/b"), Bytes::from_static(b"payload")).unwrap();
        assert_eq!(remote_path, "/registry/a/b");
        assert_eq!(f.driver.get_content(&p("/a/b")).unwrap(), Bytes::from_static(b"payload"));
    }

    #[test]
    fn put_writes_through_every_tier() {
        let f = fixture();
        f.driver.put_content(&p("/img/layer"), Bytes::from_static(b"B")).unwrap();

        assert_eq!(f.driver.cache().lookup(&p("/img/layer")).unwrap(), Bytes::from_static(b"B"));
        assert_eq!(fs::read(staged(&f, "/img/layer")).unwrap(), b"B");
        assert_eq!(f.remote.get("/registry/img/layer").unwrap(), b"B");
    }

    #[test]
    fn get_falls_through_to_remote() {
        let f = fixture();
        f.remote.seed("/registry/only/remote", b"from far away");

        let first = f.driver.get_content(&p("only/remote")).unwrap();
        assert_eq!(first, Bytes::from_static(b"from far away"));
        assert!(staged(&f, "only/remote").exists());
        assert_eq!(f.remote.calls().download, 1);

        f.driver.get_content(&p("only/remote")).unwrap();
        assert_eq!(f.remote.calls().download, 1);
        assert_eq!(f.driver.cache().stats().hits, 1);
    }

    #[test]
    fn get_of_missing_is_not_found() {
        let f = fixture();
        let err = f.driver.get_content(&p("/nope")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!staged(&f, "/nope").exists());
    }

    #[test]
    fn overwrite_replaces_content() {
        let f = fixture();
        f.driver.put_content(&p("/k"), Bytes::from_static(b"one")).unwrap();
        f.driver.put_content(&p("/k"), Bytes::from_static(b"two")).unwrap();
        f.driver.cache().clear();
        assert_eq!(f.driver.get_content(&p("/k")).unwrap(), Bytes::from_static(b"two"));
    }

    #[test]
    fn eviction_is_transparent() {
        let f = fixture_with(|c| c.cache = CacheConfig { max_entries: 2, max_bytes: None });
        f.driver.put_content(&p("/target"), Bytes::from_static(b"keep me")).unwrap();
        for i in 0..3 {
            f.driver.put_content(&p(&format!("/other/{i}")), Bytes::from(vec![i as u8])).unwrap();
        }
        assert!(!f.driver.cache().contains(&p("/target")));
        assert_eq!(f.driver.get_content(&p("/target")).unwrap(), Bytes::from_static(b"keep me"));
    }

    #[test]
    fn capacity_one_falls_back_to_disk() {
        let f = fixture_with(|c| c.cache = CacheConfig { max_entries: 1, max_bytes: None });
        f.driver.put_content(&p("/x"), Bytes::from_static(b"1")).unwrap();
        f.driver.put_content(&p("/y"), Bytes::from_static(b"2")).unwrap();
        assert_eq!(f.driver.get_content(&p("/x")).unwrap(), Bytes::from_static(b"1"));
    }

    #[test]
    fn root_cannot_hold_content() {
        let f = fixture();
        let err = f.driver.put_content(&ObjectPath::root(), Bytes::new()).unwrap_err();
        assert!(matches!(err, DriverError::InvalidPath(_)));
        let err = f.driver.stream_write(&ObjectPath::root(), &mut io::empty()).unwrap_err();
        assert!(matches!(err, DriverError::InvalidPath(_)));
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    #[test]
    fn remove_leaves_a_tombstone() {
        let f = fixture();
        f.driver.put_content(&p("/a/b"), Bytes::from_static(b"x")).unwrap();
        f.driver.remove(&p("/a/b")).unwrap();

        assert!(!f.driver.cache().contains(&p("/a/b")));
        assert!(!staged(&f, "/a/b").exists());
        assert!(f.remote.get("/registry/a/b").is_none());
        assert!(!f.driver.exists(&p("/a/b")).unwrap());
        assert!(f.driver.get_content(&p("/a/b")).unwrap_err().is_not_found());
    }

    #[test]
    fn second_remove_is_not_found_and_harmless() {
        let f = fixture();
        f.driver.put_content(&p("/a/b"), Bytes::from_static(b"x")).unwrap();
        f.driver.put_content(&p("/a/c"), Bytes::from_static(b"y")).unwrap();

        f.driver.remove(&p("/a/b")).unwrap();
        let err = f.driver.remove(&p("/a/b")).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.driver.get_content(&p("/a/c")).unwrap(), Bytes::from_static(b"y"));
    }

    #[test]
    fn remove_of_staged_directory_stays_local() {
        let f = fixture();
        f.driver.put_content(&p("/repo/tag"), Bytes::from_static(b"t")).unwrap();
        f.driver.remove(&p("/repo")).unwrap();

        assert!(!staged(&f, "/repo").exists());
        assert!(!f.driver.cache().contains(&p("/repo/tag")));
        assert_eq!(f.remote.calls().rm, 0);
        // The remote copy is authoritative and still served.
        assert_eq!(f.driver.get_content(&p("/repo/tag")).unwrap(), Bytes::from_static(b"t"));
    }

    #[test]
    fn remove_with_remote_offline_is_retryable() {
        let f = fixture();
        f.driver.put_content(&p("/a"), Bytes::from_static(b"x")).unwrap();
        f.remote.set_online(false);

        let err = f.driver.remove(&p("/a")).unwrap_err();
        assert!(matches!(err, DriverError::RemoteUnavailable(_)));
        assert!(!f.driver.cache().contains(&p("/a")));
    }

    // -----------------------------------------------------------------------
    // Ranged streaming
    // -----------------------------------------------------------------------

    #[test]
    fn hello_world_scenario() {
        let f = fixture();
        f.driver.put_content(&p("/a/b"), Bytes::from_static(b"hello world")).unwrap();
        assert_eq!(f.driver.get_size(&p("/a/b")).unwrap(), 11);

        let chunks = f.driver.stream_read(&p("/a/b"), Some(ByteRange::new(0, 4))).unwrap();
        assert_eq!(chunks.concat().unwrap(), b"hello");

        f.driver.remove(&p("/a/b")).unwrap();
        assert!(!f.driver.exists(&p("/a/b")).unwrap());
    }

    #[test]
    fn stream_read_chunks_by_buffer_size() {
        let f = fixture();
        f.driver.put_content(&p("/s"), Bytes::from_static(b"0123456789")).unwrap();
        let lens: Vec<usize> = f
            .driver
            .stream_read(&p("/s"), None)
            .unwrap()
            .map(|c| c.unwrap().len())
            .collect();
        assert_eq!(lens, vec![4, 4, 2]);
    }

    #[test]
    fn degenerate_range_yields_nothing() {
        let f = fixture();
        f.driver.put_content(&p("/s"), Bytes::from_static(b"0123456789")).unwrap();
        let mut stream = f.driver.stream_read(&p("/s"), Some(ByteRange::new(5, 4))).unwrap();
        assert!(stream.next().is_none());
    }

    #[test]
    fn stream_read_downloads_but_skips_memory() {
        let f = fixture();
        f.remote.seed("/registry/big", b"remote bytes");
        let content = f.driver.stream_read(&p("/big"), None).unwrap().concat().unwrap();
        assert_eq!(content, b"remote bytes");
        assert!(!f.driver.cache().contains(&p("/big")));
        assert!(staged(&f, "/big").exists());
    }

    #[test]
    fn stream_read_of_missing_or_directory_is_not_found() {
        let f = fixture();
        assert!(f.driver.stream_read(&p("/nope"), None).unwrap_err().is_not_found());
        f.driver.put_content(&p("/d/leaf"), Bytes::from_static(b"x")).unwrap();
        assert!(f.driver.stream_read(&p("/d"), None).unwrap_err().is_not_found());
    }

    #[test]
    fn open_stream_is_not_torn_by_overwrite() {
        let f = fixture();
        f.driver.put_content(&p("/v"), Bytes::from_static(b"version-one")).unwrap();
        let mut stream = f.driver.stream_read(&p("/v"), None).unwrap();
        let first = stream.next().unwrap().unwrap();

        f.driver.put_content(&p("/v"), Bytes::from_static(b"VERSION-TWO!")).unwrap();

        let mut seen = first.to_vec();
        for chunk in stream {
            seen.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(seen, b"version-one");
        assert_eq!(f.driver.get_content(&p("/v")).unwrap(), Bytes::from_static(b"VERSION-TWO!"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn ranged_read_matches_slice(
            content in proptest::collection::vec(any::<u8>(), 1..200),
            a in any::<prop::sample::Index>(),
            b in any::<prop::sample::Index>(),
        ) {
            let f = fixture();
            let (s, e) = {
                let (x, y) = (a.index(content.len()), b.index(content.len()));
                (x.min(y), x.max(y))
            };
            f.driver.put_content(&p("/prop"), Bytes::from(content.clone())).unwrap();
            let got = f
                .driver
                .stream_read(&p("/prop"), Some(ByteRange::new(s as u64, e as u64)))
                .unwrap()
                .concat()
                .unwrap();
            prop_assert_eq!(got.len(), e - s + 1);
            prop_assert_eq!(&got[..], &content[s..=e]);
        }
    }

    // -----------------------------------------------------------------------
    // Streamed writes
    // -----------------------------------------------------------------------

    #[test]
    fn stream_write_uploads_and_invalidates() {
        let f = fixture();
        f.driver.put_content(&p("/w"), Bytes::from_static(b"stale")).unwrap();

        let mut input = io::Cursor::new(b"streamed content".to_vec());
        let receipt = f.driver.stream_write(&p("/w"), &mut input).unwrap();

        assert_eq!(receipt.remote_path, "/registry/w");
        assert_eq!(receipt.bytes_written, 16);
        assert!(!receipt.input_truncated);
        assert!(!f.driver.cache().contains(&p("/w")));
        assert_eq!(f.remote.get("/registry/w").unwrap(), b"streamed content");
        assert_eq!(f.driver.get_content(&p("/w")).unwrap(), Bytes::from_static(b"streamed content"));
    }

    #[test]
    fn broken_input_commits_prefix() {
        let f = fixture();
        let mut input = BrokenReader { data: io::Cursor::new(b"partial".to_vec()) };
        let receipt = f.driver.stream_write(&p("/part"), &mut input).unwrap();

        assert!(receipt.input_truncated);
        assert_eq!(receipt.bytes_written, 7);
        assert_eq!(f.remote.get("/registry/part").unwrap(), b"partial");
    }

    #[test]
    fn strict_input_fails_without_commit() {
        let f = fixture_with(|c| c.strict_stream_input = true);
        f.driver.put_content(&p("/part"), Bytes::from_static(b"original")).unwrap();

        let mut input = BrokenReader { data: io::Cursor::new(b"partial".to_vec()) };
        let err = f.driver.stream_write(&p("/part"), &mut input).unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));

        assert_eq!(fs::read(staged(&f, "/part")).unwrap(), b"original");
        assert_eq!(f.remote.get("/registry/part").unwrap(), b"original");
    }

    // -----------------------------------------------------------------------
    // Listing, existence and size
    // -----------------------------------------------------------------------

    #[test]
    fn list_relativises_entries() {
        let f = fixture();
        f.driver.put_content(&p("/repo/a"), Bytes::from_static(b"1")).unwrap();
        f.driver.put_content(&p("/repo/sub/b"), Bytes::from_static(b"22")).unwrap();

        let listing = f.driver.list_directory(&p("/repo")).unwrap();
        let paths: Vec<&str> = listing.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["repo/a", "repo/sub"]);
        assert!(listing[1].is_dir);
        assert_eq!(listing[0].size, 1);

        let root = f.driver.list_directory(&ObjectPath::root()).unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].path.as_str(), "repo");
    }

    #[test]
    fn listing_is_one_remote_call_walkable_twice() {
        let f = fixture();
        f.remote.seed("/registry/d/one", b"1");
        f.remote.seed("/registry/d/two", b"22");
        let before = f.remote.calls().list;

        let listing = f.driver.list_directory(&p("/d")).unwrap();
        f.remote.seed("/registry/d/three", b"333");
        let first: Vec<_> = listing.iter().map(|e| e.path.clone()).collect();
        let second: Vec<_> = listing.iter().map(|e| e.path.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(f.remote.calls().list, before + 1);
    }

    #[test]
    fn list_of_empty_or_missing_is_not_found() {
        let f = fixture();
        f.remote.mkdir_parents("/registry/empty").unwrap();
        assert!(f.driver.list_directory(&p("/empty")).unwrap_err().is_not_found());
        assert!(f.driver.list_directory(&p("/missing")).unwrap_err().is_not_found());
    }

    #[test]
    fn list_reflects_remote_changes() {
        let f = fixture();
        f.remote.seed("/registry/d/one", b"1");
        assert_eq!(f.driver.list_directory(&p("/d")).unwrap().len(), 1);
        f.remote.seed("/registry/d/two", b"2");
        assert_eq!(f.driver.list_directory(&p("/d")).unwrap().len(), 2);
    }

    #[test]
    fn exists_checks_local_then_remote() {
        let f = fixture();
        f.remote.seed("/registry/remote-only", b"r");
        assert!(f.driver.exists(&p("/remote-only")).unwrap());
        assert_eq!(f.remote.calls().exists, 1);

        f.driver.put_content(&p("/local"), Bytes::from_static(b"l")).unwrap();
        let before = f.remote.calls().exists;
        assert!(f.driver.exists(&p("/local")).unwrap());
        assert_eq!(f.remote.calls().exists, before);

        assert!(!f.driver.exists(&p("/neither")).unwrap());
    }

    #[test]
    fn size_falls_back_to_remote_usage() {
        let f = fixture();
        f.remote.seed("/registry/dir/a", b"123");
        f.remote.seed("/registry/dir/b", b"45");
        assert_eq!(f.driver.get_size(&p("/dir/a")).unwrap(), 3);
        assert_eq!(f.driver.get_size(&p("/dir")).unwrap(), 5);
        assert!(f.driver.get_size(&p("/nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn supports_ranges() {
        assert!(fixture().driver.supports_bytes_range());
    }

    // -----------------------------------------------------------------------
    // Remote failures
    // -----------------------------------------------------------------------

    #[test]
    fn failed_upload_surfaces_and_drops_cache() {
        let f = fixture();
        f.driver.put_content(&p("/a"), Bytes::from_static(b"v1")).unwrap();
        f.remote.set_online(false);

        let err = f.driver.put_content(&p("/a"), Bytes::from_static(b"v2")).unwrap_err();
        assert!(err.is_retryable());
        assert!(!f.driver.cache().contains(&p("/a")));
        // The staged copy keeps the unsynced bytes until the caller retries.
        assert_eq!(fs::read(staged(&f, "/a")).unwrap(), b"v2");
        assert_eq!(f.remote.get("/registry/a").unwrap(), b"v1");

        f.remote.set_online(true);
        f.driver.put_content(&p("/a"), Bytes::from_static(b"v2")).unwrap();
        assert_eq!(f.remote.get("/registry/a").unwrap(), b"v2");
    }

    #[test]
    fn offline_remote_is_not_reported_as_missing() {
        let f = fixture();
        f.remote.seed("/registry/far", b"x");
        f.remote.set_online(false);

        let err = f.driver.get_content(&p("/far")).unwrap_err();
        assert!(matches!(err, DriverError::RemoteUnavailable(_)));
        assert!(!staged(&f, "/far").exists());

        assert!(f.driver.exists(&p("/far")).unwrap_err().is_retryable());
        assert!(f.driver.list_directory(&ObjectPath::root()).unwrap_err().is_retryable());
        assert!(f.driver.get_size(&p("/far")).unwrap_err().is_retryable());
    }

    #[test]
    fn timeouts_map_to_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(FailingRemote::new(timing_out));
        let config = DriverConfig::with_roots("/registry", dir.path().join("staging"));
        let driver = TieredBlobDriver::new(config, remote.clone()).unwrap();

        remote.inner.seed("/registry/t", b"x");
        remote.failing.store(true, Ordering::SeqCst);

        let err = driver.get_content(&p("/t")).unwrap_err();
        assert!(matches!(err, DriverError::Timeout { .. }));
        assert!(err.is_retryable());
        let err = driver.put_content(&p("/t"), Bytes::from_static(b"y")).unwrap_err();
        assert!(matches!(err, DriverError::Timeout { .. }));
        let err = driver.remove(&p("/t")).unwrap_err();
        assert!(matches!(err, DriverError::Timeout { .. }));
    }

    #[test]
    fn upload_beneath_a_file_is_not_retryable() {
        let f = fixture();
        f.remote.seed("/registry/file", b"x");
        let err = f.driver.put_content(&p("/file/child"), Bytes::from_static(b"y")).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DriverConfig::with_roots("/registry", dir.path());
        config.buffer_size = 0;
        let err = TieredBlobDriver::new(config, Arc::new(InMemoryRemote::new())).unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn shared_paths_never_serve_torn_values() {
        let f = Arc::new(fixture_with(|c| c.cache = CacheConfig { max_entries: 4, max_bytes: None }));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    let path = p(&format!("/shared/{}", t % 4));
                    for round in 0..20u32 {
                        f.driver.put_content(&path, Bytes::from(format!("{t}:{round}"))).unwrap();
                        let read = f.driver.get_content(&path).unwrap();
                        let text = String::from_utf8(read.to_vec()).unwrap();
                        let (writer, n) = text.split_once(':').unwrap();
                        assert_eq!(writer.parse::<usize>().unwrap() % 4, t % 4);
                        assert!(n.parse::<u32>().unwrap() < 20);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn staged_directory_removal_never_breaks_child_writes() {
        let f = Arc::new(fixture());
        let done = Arc::new(AtomicBool::new(false));
        let remover = {
            let f = Arc::clone(&f);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut removed = 0u32;
                loop {
                    let last = done.load(Ordering::SeqCst);
                    // Only this thread deletes, so a staged directory seen
                    // here is still one when remove looks.
                    if staged(&f, "/repo").is_dir() {
                        f.driver.remove(&p("/repo")).unwrap();
                        removed += 1;
                    }
                    if last {
                        return removed;
                    }
                }
            })
        };

        for i in 0..500u32 {
            let path = p(&format!("/repo/t{}", i % 4));
            let body = Bytes::from(format!("tag-{i}"));
            f.driver.put_content(&path, body.clone()).unwrap();
            assert_eq!(f.driver.get_content(&path).unwrap(), body);
        }
        done.store(true, Ordering::SeqCst);
        assert!(remover.join().unwrap() > 0);
        assert_eq!(f.remote.calls().rm, 0);
    }

    #[test]
    fn sole_writer_always_reads_own_write() {
        let f = Arc::new(fixture_with(|c| c.cache = CacheConfig { max_entries: 2, max_bytes: None }));
        let handles: Vec<_> = (0..6)
            .map(|t| {
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    let path = p(&format!("/own/{t}"));
                    for round in 0..25u32 {
                        let body = Bytes::from(format!("{t}-{round}"));
                        f.driver.put_content(&path, body.clone()).unwrap();
                        assert_eq!(f.driver.get_content(&path).unwrap(), body);
                        let streamed = f.driver.stream_read(&path, None).unwrap().concat().unwrap();
                        assert_eq!(streamed, body.to_vec());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
