//! Driver configuration.
//!
//! Loaded from the `[driver]` table of a TOML file:
//!
//! ```toml
//! [driver]
//! root_path = "/registry"
//! local_staging_root = "/var/lib/blobtier/staging"
//! buffer_size = 65536
//! lock_stripes = 64
//! remote_timeout_secs = 60
//! strict_stream_input = false
//!
//! [driver.cache]
//! max_entries = 1024
//! max_bytes = 268435456
//! ```
//!
//! Environment overrides: `BLOBTIER_ROOT_PATH`, `BLOBTIER_STAGING_ROOT`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blobtier_cache::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

pub const ENV_ROOT_PATH: &str = "BLOBTIER_ROOT_PATH";
pub const ENV_STAGING_ROOT: &str = "BLOBTIER_STAGING_ROOT";

/// Static configuration handed to [`TieredBlobDriver`](crate::TieredBlobDriver).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Remote directory under which every object lives.
    pub root_path: String,
    /// Local directory mirroring `root_path`.
    pub local_staging_root: PathBuf,
    /// Chunk size for streamed reads and writes.
    pub buffer_size: usize,
    /// Number of per-path mutexes.
    pub lock_stripes: usize,
    /// Deadline for a single remote command. `None` waits indefinitely.
    pub remote_timeout_secs: Option<u64>,
    /// Fail `stream_write` on input errors instead of committing what was read.
    pub strict_stream_input: bool,
    /// Memory tier bounds.
    pub cache: CacheConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            root_path: "/registry".into(),
            local_staging_root: env::temp_dir().join("blobtier"),
            buffer_size: 64 * 1024,
            lock_stripes: 64,
            remote_timeout_secs: Some(60),
            strict_stream_input: false,
            cache: CacheConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Defaults with the two roots replaced.
    pub fn with_roots(root_path: impl Into<String>, staging: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            local_staging_root: staging.into(),
            ..Default::default()
        }
    }

    /// Parse the `[driver]` table of a TOML document. A document without
    /// that table yields the defaults.
    pub fn from_toml_str(contents: &str) -> DriverResult<Self> {
        let table: toml::Table = contents
            .parse()
            .map_err(|e: toml::de::Error| DriverError::Config(e.to_string()))?;

        let config: Self = match table.get("driver") {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| DriverError::Config(format!("[driver]: {e}")))?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> DriverResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DriverError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply `BLOBTIER_ROOT_PATH` and `BLOBTIER_STAGING_ROOT` when set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(env::var(ENV_ROOT_PATH).ok(), env::var(ENV_STAGING_ROOT).ok());
    }

    fn apply_overrides(&mut self, root: Option<String>, staging: Option<String>) {
        if let Some(root) = root.filter(|v| !v.is_empty()) {
            self.root_path = root;
        }
        if let Some(staging) = staging.filter(|v| !v.is_empty()) {
            self.local_staging_root = PathBuf::from(staging);
        }
    }

    /// Reject configurations the driver cannot run with.
    pub fn validate(&self) -> DriverResult<()> {
        if !self.root_path.starts_with('/') && !self.root_path.contains("://") {
            return Err(DriverError::Config(format!(
                "root_path must be absolute or a URI, got {:?}",
                self.root_path
            )));
        }
        if self.local_staging_root.as_os_str().is_empty() {
            return Err(DriverError::Config("local_staging_root is empty".into()));
        }
        if self.buffer_size == 0 {
            return Err(DriverError::Config("buffer_size must be non-zero".into()));
        }
        if self.lock_stripes == 0 {
            return Err(DriverError::Config("lock_stripes must be non-zero".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(DriverError::Config("cache.max_entries must be non-zero".into()));
        }
        if self.remote_timeout_secs == Some(0) {
            return Err(DriverError::Config("remote_timeout_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_secs.map(Duration::from_secs)
    }

    /// Render as a TOML document with a `[driver]` table.
    pub fn to_toml_string(&self) -> DriverResult<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            driver: &'a DriverConfig,
        }
        toml::to_string_pretty(&Document { driver: self })
            .map_err(|e| DriverError::Config(e.to_string()))
    }
}
