use std::sync::{Mutex, MutexGuard, PoisonError};

use blobtier_types::ObjectPath;

const STRIPE_DOMAIN: &str = "blobtier-lock-v1";

/// Striped per-path mutual exclusion.
///
/// A path always maps to the same stripe, so operations on one path are
/// serialised while unrelated paths only contend when they collide on a
/// stripe. Stripes are chosen by a domain-separated BLAKE3 hash of the
/// normalised path.
pub struct PathLocks {
    stripes: Vec<Mutex<()>>,
}

impl PathLocks {
    /// Create `count` stripes (at least one).
    pub fn new(count: usize) -> Self {
        let stripes = (0..count.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Index of the stripe guarding `path`.
    pub fn stripe_of(&self, path: &ObjectPath) -> usize {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STRIPE_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(path.as_str().as_bytes());
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.stripes.len() as u64) as usize
    }

    /// Block until `path`'s stripe is held.
    ///
    /// The guarded data is `()`, so a stripe poisoned by a panicking holder
    /// is simply reacquired.
    pub fn lock(&self, path: &ObjectPath) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(path)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every stripe is held, acquired in index order.
    ///
    /// Used for operations that touch a whole subtree of paths. The caller
    /// must not already hold a stripe.
    pub fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        self.stripes
            .iter()
            .map(|stripe| stripe.lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

impl std::fmt::Debug for PathLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathLocks").field("stripes", &self.stripes.len()).finish()
    }
}
