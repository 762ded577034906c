//! Parsed header cache
//!
//! Parsing a header is the expensive part of every query, so callers keep a
//! [`HeaderCache`] and pass it to each operation. Entries stay valid until
//! invalidated; the cache never looks at the file again on its own.

use crate::error::Result;
use crate::paths::absolute;
use crate::reader::Archive;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Archives keyed by absolute path
pub struct HeaderCache {
    archives: LruCache<PathBuf, Arc<Archive>>,
}

impl HeaderCache {
    /// Cache without a size limit
    pub fn new() -> Self {
        HeaderCache {
            archives: LruCache::unbounded(),
        }
    }

    /// Cache holding at most `capacity` archives (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        HeaderCache {
            archives: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn get(&mut self, path: &Path) -> Option<Arc<Archive>> {
        let key = absolute(path).ok()?;
        self.archives.get(&key).cloned()
    }

    pub fn put(&mut self, archive: Archive) -> Arc<Archive> {
        let archive = Arc::new(archive);
        self.archives
            .put(archive.path().to_path_buf(), Arc::clone(&archive));
        archive
    }

    /// Cached archive for `path`, parsing the header on a miss
    pub fn load(&mut self, path: &Path) -> Result<Arc<Archive>> {
        let key = absolute(path)?;
        if let Some(archive) = self.archives.get(&key) {
            debug!("Header cache hit for {}", key.display());
            return Ok(Arc::clone(archive));
        }
        debug!("Header cache miss for {}", key.display());
        Ok(self.put(Archive::open(&key)?))
    }

    /// Forget `path`; returns whether it was cached
    pub fn invalidate(&mut self, path: &Path) -> bool {
        match absolute(path) {
            Ok(key) => self.archives.pop(&key).is_some(),
            Err(_) => false,
        }
    }

    pub fn invalidate_all(&mut self) {
        self.archives.clear();
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}
