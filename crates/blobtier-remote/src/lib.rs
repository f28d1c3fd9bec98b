//! Remote filesystem contract for blobtier.
//!
//! The remote tier is the slow, authoritative copy of every object. The
//! driver only ever talks to it through the [`RemoteStore`] trait, a
//! command-style interface modelled on a distributed filesystem shell
//! (`mkdir -p`, `du -s`, `rm -r`, `put -f`, `get`, `ls`, `test -e`).
//!
//! # Backends
//!
//! - [`InMemoryRemote`] -- `BTreeMap`-based tree for tests and embedding
//! - [`FsRemote`] -- a local directory standing in for a mounted remote
//! - [`HadoopCli`] -- shells out to `hadoop fs`
//!
//! # Contract Rules
//!
//! 1. Paths are absolute, `/`-separated strings.
//! 2. `upload_force` requires the parent directory to exist; callers create
//!    it with `mkdir_parents` first.
//! 3. Missing paths are reported as [`RemoteError::NotFound`], never as a
//!    transport failure.
//! 4. Backends hold no locks across calls; ordering is the caller's job.

pub mod error;
pub mod fs;
pub mod hadoop;
pub mod memory;
pub mod traits;

pub use error::{RemoteError, RemoteResult};
pub use fs::FsRemote;
pub use hadoop::HadoopCli;
pub use memory::{CallCounts, InMemoryRemote};
pub use traits::{RemoteEntry, RemoteStore};
