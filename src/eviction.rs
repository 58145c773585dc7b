//! Size-budget enforcement for the cache store.
//!
//! LRU approximated by file mtime: no auxiliary index, the filesystem's own
//! metadata is the ordering key. The threshold/target gap means each sweep
//! frees at least the gap's share of the budget, so sweeps stay rare relative
//! to cache turnover.

use crate::{config::Settings, store::CacheStore};
use std::fs;

/// Outcome of one sweep, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepSummary {
    pub(crate) evicted: usize,
    pub(crate) remaining_bytes: u64,
}

/// Enforce the size budget, oldest entries first.
///
/// When the store exceeds `cleanup_threshold x max_cache_size`, deletes
/// entries in ascending mtime order (ties broken by path) until it is back
/// under `cleanup_target x max_cache_size`. Individual deletion failures are
/// skipped. Always resets the `invocations_since_cleanup` counter.
pub(crate) fn enforce_budget(store: &CacheStore, settings: &mut Settings) -> SweepSummary {
    let max = settings.max_cache_size() as f64;
    let threshold = settings.cleanup_threshold() * max;
    let target = settings.cleanup_target() * max;

    let mut entries = store.iter_entries();
    let mut total: u64 = entries.iter().map(|entry| entry.size).sum();
    let mut evicted = 0;

    if total as f64 > threshold {
        entries.sort_by(|a, b| a.mtime.cmp(&b.mtime).then_with(|| a.path.cmp(&b.path)));

        for entry in &entries {
            if total as f64 <= target {
                break;
            }
            if let Err(e) = fs::remove_file(&entry.path) {
                tracing::debug!(
                    "Skipping undeletable cache entry {}: {e}",
                    entry.path.display()
                );
                continue;
            }
            total -= entry.size;
            evicted += 1;
        }

        tracing::info!("Evicted {evicted} cache entries; {total} bytes remain");
    }

    settings.reset_invocations_since_cleanup();

    SweepSummary {
        evicted,
        remaining_bytes: total,
    }
}
