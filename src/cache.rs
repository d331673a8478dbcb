//! Per-file completion cache with package/source global partitions
//!
//! # Architecture
//!
//! ```text
//! CompletionCache (one parking_lot::Mutex)
//!   ├─ files:   path → candidates resolved for that file
//!   ├─ cabal:   installed-package symbols   ┐
//!   ├─ sources: project-source symbols      ├─ global = dedup(cabal ∪ sources)
//!   └─ global:  derived, recomputed on write┘
//! ```
//!
//! # Thread Safety
//!
//! Every operation takes the single lock once, so each call is atomic with
//! respect to concurrent callers: a reader never sees a new partition paired
//! with a stale merged list. Sequences of calls (check, populate, store) are
//! NOT atomic; that sequencing belongs to the coordinator, which accepts
//! last-write-wins for concurrent population of the same file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::candidate::{CandidateList, SourceLocation, sorted_completions};

/// Cache statistics for monitoring and debugging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Per-file lookups that found an entry
    pub hits: u64,

    /// Per-file lookups that found nothing
    pub misses: u64,

    /// Entries removed by `invalidate` / `invalidate_all`
    pub invalidations: u64,

    /// Number of cached files
    pub files: usize,
}

impl CacheStats {
    /// Hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The unguarded cache state
///
/// Only reachable through [`SharedCompletionCache`], which owns the lock.
#[derive(Debug, Default)]
pub struct CompletionCache {
    files: HashMap<PathBuf, CandidateList>,
    cabal: CandidateList,
    sources: CandidateList,
    global: CandidateList,
    source_locations: Option<Vec<(String, SourceLocation)>>,
    stats: CacheStats,
}

impl CompletionCache {
    pub fn file(&mut self, path: &Path) -> Option<&CandidateList> {
        match self.files.get(path) {
            Some(list) => {
                self.stats.hits += 1;
                Some(list)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn set_file(&mut self, path: PathBuf, candidates: CandidateList) {
        self.files.insert(path, candidates);
        self.stats.files = self.files.len();
    }

    pub fn set_cabal(&mut self, candidates: CandidateList) {
        self.cabal = candidates;
        self.recompute_global();
    }

    pub fn set_sources(&mut self, candidates: CandidateList) {
        self.sources = candidates;
        self.recompute_global();
    }

    pub fn cabal(&self) -> &CandidateList {
        &self.cabal
    }

    pub fn sources(&self) -> &CandidateList {
        &self.sources
    }

    pub fn global(&self) -> &CandidateList {
        &self.global
    }

    pub fn set_locations(&mut self, locations: Vec<(String, SourceLocation)>) {
        self.source_locations = Some(locations);
    }

    pub fn locations(&self) -> Option<&[(String, SourceLocation)]> {
        self.source_locations.as_deref()
    }

    pub fn invalidate(&mut self, path: &Path) -> bool {
        let removed = self.files.remove(path).is_some();
        if removed {
            self.stats.invalidations += 1;
            self.stats.files = self.files.len();
        }
        removed
    }

    pub fn invalidate_all(&mut self) -> usize {
        let count = self.files.len();
        self.files.clear();
        self.stats.invalidations += count as u64;
        self.stats.files = 0;
        count
    }

    fn recompute_global(&mut self) {
        self.global = sorted_completions(self.cabal.iter().chain(self.sources.iter()).cloned());
    }
}

/// Handle to the process-wide completion cache
///
/// Cloning the handle shares the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct SharedCompletionCache {
    inner: Arc<Mutex<CompletionCache>>,
}

impl SharedCompletionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` inside the cache's exclusive-access scope
    ///
    /// Use for reads that must observe the file map and the partitions together.
    pub fn with<R>(&self, f: impl FnOnce(&mut CompletionCache) -> R) -> R {
        let mut cache = self.inner.lock();
        f(&mut cache)
    }

    /// Cached candidates for `path`; never triggers computation
    pub fn get_file_candidates(&self, path: &Path) -> Option<CandidateList> {
        self.with(|cache| cache.file(path).cloned())
    }

    /// Cached candidates for `path`, else the global list
    pub fn file_or_global(&self, path: &Path) -> CandidateList {
        self.with(|cache| {
            let hit = cache.file(path).cloned();
            hit.unwrap_or_else(|| cache.global().clone())
        })
    }

    pub fn set_file_candidates(&self, path: impl Into<PathBuf>, candidates: CandidateList) {
        self.with(|cache| cache.set_file(path.into(), candidates));
    }

    pub fn set_cabal_partition(&self, candidates: CandidateList) {
        self.with(|cache| cache.set_cabal(candidates));
    }

    pub fn set_source_partition(&self, candidates: CandidateList) {
        self.with(|cache| cache.set_sources(candidates));
    }

    pub fn set_source_locations(&self, locations: Vec<(String, SourceLocation)>) {
        self.with(|cache| cache.set_locations(locations));
    }

    pub fn source_locations(&self) -> Option<Vec<(String, SourceLocation)>> {
        self.with(|cache| cache.locations().map(<[_]>::to_vec))
    }

    /// The merged package + source list; never triggers computation
    pub fn global_candidates(&self) -> CandidateList {
        self.with(|cache| cache.global().clone())
    }

    /// Which partitions are still empty, as `(cabal, sources)`
    pub fn empty_partitions(&self) -> (bool, bool) {
        self.with(|cache| (cache.cabal().is_empty(), cache.sources().is_empty()))
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        self.with(|cache| cache.invalidate(path))
    }

    /// Drop every file entry; partitions are left untouched
    pub fn invalidate_all(&self) -> usize {
        self.with(|cache| cache.invalidate_all())
    }

    pub fn stats(&self) -> CacheStats {
        self.with(|cache| cache.stats.clone())
    }
}
