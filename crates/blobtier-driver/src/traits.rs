use std::io::Read;

use blobtier_types::{ByteRange, ObjectPath};
use bytes::Bytes;
use serde::Serialize;

use crate::error::DriverResult;
use crate::stream::ChunkStream;

/// Outcome of a streamed write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    /// Remote path the content was uploaded to.
    pub remote_path: String,
    /// Bytes committed to the staged copy and uploaded.
    pub bytes_written: u64,
    /// Whether reading the input failed before it was exhausted, so only a
    /// prefix of the intended content was stored.
    pub input_truncated: bool,
}

/// One entry of a directory listing, relative to the store root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub path: ObjectPath,
    pub is_dir: bool,
    pub size: u64,
}

/// Path-addressed content store.
///
/// All implementations must satisfy these invariants:
/// - Write-through: after `put_content(P, B)` returns `Ok`, every tier holds
///   `B` for `P` and a later `get_content(P)` returns exactly `B`.
/// - Tombstone: after `remove(P)` returns, no tier reports `P` present.
/// - Ranged reads never yield bytes outside the requested range or beyond
///   the object's size.
/// - Operations on one path are linearisable; a read that starts after a
///   write returned observes that write.
pub trait BlobStore: Send + Sync {
    /// Full content of `path`.
    fn get_content(&self, path: &ObjectPath) -> DriverResult<Bytes>;

    /// Replace the content of `path` in every tier. Returns the remote path.
    fn put_content(&self, path: &ObjectPath, content: Bytes) -> DriverResult<String>;

    /// Stream the content of `path`, optionally limited to an inclusive range.
    fn stream_read(&self, path: &ObjectPath, range: Option<ByteRange>) -> DriverResult<ChunkStream>;

    /// Replace the content of `path` with everything read from `input`.
    fn stream_write(&self, path: &ObjectPath, input: &mut dyn Read) -> DriverResult<WriteReceipt>;

    /// Direct children of `path` as reported by the remote.
    ///
    /// The listing is collected eagerly: the remote answers with one
    /// complete listing, so the returned `Vec` can be iterated any number
    /// of times. An empty or missing directory is `NotFound`.
    fn list_directory(&self, path: &ObjectPath) -> DriverResult<Vec<ListEntry>>;

    /// Whether `path` exists in the staging or remote tier.
    fn exists(&self, path: &ObjectPath) -> DriverResult<bool>;

    /// Remove `path` from every tier.
    fn remove(&self, path: &ObjectPath) -> DriverResult<()>;

    /// Size of `path` in bytes.
    fn get_size(&self, path: &ObjectPath) -> DriverResult<u64>;

    /// Whether `stream_read` honours byte ranges.
    fn supports_bytes_range(&self) -> bool {
        true
    }
}
