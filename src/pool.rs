//! # Cache Pool
//!
//! An explicit, caller-owned registry of cache instances, shared by the
//! canonical signature of their settings (base filter + comparison flags +
//! endpoint). Amortizes query cost across many write-required checks
//! without hiding state in module-level globals.

use crate::cache::MirrorCache;
use crate::config::CacheSettings;
use hashbrown::HashMap;
use tracing::debug;

/// Registry of shared cache instances, keyed by settings signature
#[derive(Debug, Default)]
pub struct CachePool {
    caches: HashMap<String, MirrorCache>,
}

impl CachePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache for these settings, creating it on first use.
    ///
    /// Sharing assumes single-writer, sequential use; callers needing
    /// parallelism shard by distinct pools or serialize access externally.
    pub fn get_or_create(&mut self, settings: &CacheSettings) -> &mut MirrorCache {
        let signature = settings.signature();
        self.caches.entry(signature).or_insert_with(|| {
            debug!(signature = %settings.signature(), "creating cache instance");
            MirrorCache::new(settings.clone())
        })
    }

    /// Number of distinct cache instances
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Drop every cache instance; the next lookup rebuilds from scratch
    pub fn clear(&mut self) {
        self.caches.clear();
    }
}
