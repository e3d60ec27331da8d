//! Version checking layered over the dumb byte store.
//!
//! The cache stores a version string but never interprets it; this guard
//! is the only place version comparison happens. A stored entry whose
//! version differs from the descriptor's expected version is a miss, and
//! the stale row is invalidated on the spot.

use crate::core::VisionResult;

use super::cache::ArtifactCache;

/// Wraps an [`ArtifactCache`] with caller-side version validation.
pub struct VersionedCacheGuard<'a> {
    cache: &'a ArtifactCache,
}

impl<'a> VersionedCacheGuard<'a> {
    pub fn new(cache: &'a ArtifactCache) -> Self {
        Self { cache }
    }

    /// Fetches an entry only if its stored version matches.
    ///
    /// A version mismatch invalidates the stale entry and reports a miss.
    pub fn get(&self, id: &str, expected_version: &str) -> VisionResult<Option<Vec<u8>>> {
        match self.cache.entry_version(id)? {
            Some(stored) if stored == expected_version => self.cache.get(id),
            Some(stored) => {
                tracing::debug!(
                    id,
                    stored = %stored,
                    expected = %expected_version,
                    "stale cached artifact invalidated"
                );
                self.cache.invalidate(id)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Stores an entry under the given version.
    pub fn put(&self, id: &str, bytes: &[u8], version: &str) -> VisionResult<()> {
        self.cache.put(id, bytes, version)
    }
}
