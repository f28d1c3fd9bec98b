//! In-process memory tier for blobtier.
//!
//! [`MemoryCache`] maps an [`ObjectPath`] to the object's full content and
//! evicts the least recently used entries once it exceeds either its entry
//! count or its byte budget. Eviction only drops the in-memory copy; the
//! staged and remote tiers are never touched from here.
//!
//! # Example
//!
//! ```
//! use blobtier_cache::{CacheConfig, MemoryCache};
//! use blobtier_types::ObjectPath;
//! use bytes::Bytes;
//!
//! let cache = MemoryCache::new(CacheConfig { max_entries: 2, max_bytes: None });
//! let a = ObjectPath::parse("/a").unwrap();
//! cache.insert(a.clone(), Bytes::from_static(b"1"));
//! assert_eq!(cache.lookup(&a).as_deref(), Some(&b"1"[..]));
//! ```

pub mod cache;

pub use cache::{CacheConfig, CacheStats, MemoryCache};
