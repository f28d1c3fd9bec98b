//! Tiered blob storage driver.
//!
//! [`TieredBlobDriver`] presents a flat, path-addressed content store backed
//! by three tiers, fastest first:
//!
//! 1. [`MemoryCache`](blobtier_cache::MemoryCache) -- bounded LRU of whole objects
//! 2. [`LocalStage`] -- byte-identical copies on local disk
//! 3. a [`RemoteStore`](blobtier_remote::RemoteStore) -- the authoritative copy
//!
//! # Consistency Rules
//!
//! 1. Write-through: a successful put has updated all three tiers.
//! 2. Tombstones: after a remove returns, no tier reports the path.
//! 3. Remote failures are never reported as success; transport failures stay
//!    distinguishable from missing objects.
//! 4. Best-effort local cleanup failures are logged and swallowed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use blobtier_driver::{BlobStore, DriverConfig, TieredBlobDriver};
//! use blobtier_remote::InMemoryRemote;
//! use blobtier_types::ObjectPath;
//!
//! let staging = tempfile::tempdir().unwrap();
//! let config = DriverConfig::with_roots("/registry", staging.path());
//! let driver = TieredBlobDriver::new(config, Arc::new(InMemoryRemote::new())).unwrap();
//!
//! let path = ObjectPath::parse("/images/abc/json").unwrap();
//! driver.put_content(&path, "{}".into()).unwrap();
//! assert_eq!(&driver.get_content(&path).unwrap()[..], b"{}");
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod locks;
pub mod resolver;
pub mod stage;
pub mod stream;
pub mod traits;

pub use config::DriverConfig;
pub use driver::TieredBlobDriver;
pub use error::{DriverError, DriverResult};
pub use locks::PathLocks;
pub use resolver::{PathResolver, ResolvedPath};
pub use stage::{LocalStage, SpoolFile};
pub use stream::ChunkStream;
pub use traits::{BlobStore, ListEntry, WriteReceipt};
